//! Ordered, synchronous event delivery.

use std::sync::Arc;

use super::event::ChangeEvent;
use super::handler::WatchHandler;

/// Ordered list of subscribers.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Arc<dyn WatchHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Delivery follows registration order.
    pub fn subscribe(&mut self, handler: Arc<dyn WatchHandler>) {
        self.handlers.push(handler);
        crate::debug_event!("bus", "subscribed", "total {}", self.handlers.len());
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver `event` to every subscriber, awaiting each in turn.
    pub async fn notify(&self, event: &ChangeEvent) {
        for (index, handler) in self.handlers.iter().enumerate() {
            crate::debug_event!(
                "bus",
                "notify",
                "subscriber {} ({}) for {} ({})",
                index + 1,
                handler.name(),
                event.relative_path.display(),
                event.kind
            );
            handler.on_event(event).await;
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::time::Duration;

    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        delay: Duration,
    }

    #[async_trait]
    impl WatchHandler for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_event(&self, event: &ChangeEvent) {
            tokio::time::sleep(self.delay).await;
            self.log
                .lock()
                .push(format!("{}:{}", self.name, event.relative_path.display()));
        }
    }

    fn recorder(name: &str, log: &Arc<Mutex<Vec<String>>>, delay_ms: u64) -> Arc<dyn WatchHandler> {
        Arc::new(Recorder {
            name: name.to_string(),
            log: log.clone(),
            delay: Duration::from_millis(delay_ms),
        })
    }

    #[tokio::test]
    async fn test_notify_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        // The slow first subscriber must still finish before the second runs
        bus.subscribe(recorder("first", &log, 30));
        bus.subscribe(recorder("second", &log, 0));

        bus.notify(&ChangeEvent::deleted(PathBuf::from("a.txt"))).await;
        bus.notify(&ChangeEvent::deleted(PathBuf::from("b.txt"))).await;

        assert_eq!(
            *log.lock(),
            vec!["first:a.txt", "second:a.txt", "first:b.txt", "second:b.txt"]
        );
    }

    #[tokio::test]
    async fn test_notify_without_subscribers() {
        let bus = EventBus::new();
        assert!(bus.is_empty());
        bus.notify(&ChangeEvent::deleted(PathBuf::from("a.txt"))).await;
    }
}
