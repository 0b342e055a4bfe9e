//! Subscriber trait for the event bus.

use async_trait::async_trait;

use super::event::ChangeEvent;

/// A subscriber that receives every change event.
///
/// Handlers are awaited one after another, so a slow handler holds back
/// both later handlers and the next scan. There is no error channel: a
/// handler logs or otherwise deals with its own failures.
#[async_trait]
pub trait WatchHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str;

    /// Handle one change event.
    async fn on_event(&self, event: &ChangeEvent);
}
