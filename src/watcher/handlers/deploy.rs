//! Handler that turns change events into redeploys.
//!
//! Changes to `deploy.json` reload the config and redeploy; changes inside
//! the configured source subtree redeploy; everything else is ignored.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::deploy::{CONFIG_FILE_NAME, Supervisor};
use crate::watcher::{ChangeEvent, WatchHandler};

/// How an event relates to the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    ConfigChanged,
    SourceChanged,
    Ignored,
}

/// Subscriber that drives the supervisor.
pub struct DeployHandler {
    supervisor: Arc<Supervisor>,
}

impl DeployHandler {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }

    /// Classify a path relative to the watched root.
    ///
    /// The config file takes precedence over the source prefix, so it is
    /// recognised even when the source subtree is the whole tree.
    pub fn classify(&self, relative_path: &Path) -> EventClass {
        if relative_path == Path::new(CONFIG_FILE_NAME) {
            EventClass::ConfigChanged
        } else if self.supervisor.config().covers(relative_path) {
            EventClass::SourceChanged
        } else {
            EventClass::Ignored
        }
    }

    async fn redeploy(&self) {
        match self.supervisor.redeploy().await {
            Ok(pid) => crate::log_event!("deploy", "redeployed", "pid {pid}"),
            Err(e) => tracing::error!("[deploy] redeploy failed: {e}"),
        }
    }
}

#[async_trait]
impl WatchHandler for DeployHandler {
    fn name(&self) -> &str {
        "deploy"
    }

    async fn on_event(&self, event: &ChangeEvent) {
        match self.classify(&event.relative_path) {
            EventClass::ConfigChanged => {
                match self.supervisor.reload_config() {
                    Ok(config) => crate::log_event!(
                        "deploy",
                        "config reloaded",
                        "{} {:?}",
                        config.executable.display(),
                        config.args
                    ),
                    Err(e) => tracing::warn!("[deploy] keeping previous config: {e}"),
                }
                self.redeploy().await;
            }
            EventClass::SourceChanged => {
                crate::log_event!(
                    "deploy",
                    "source changed",
                    "{} ({}), redeploying",
                    event.relative_path.display(),
                    event.kind
                );
                self.redeploy().await;
            }
            EventClass::Ignored => {
                crate::debug_event!("deploy", "ignored", "{}", event.relative_path.display());
            }
        }
    }
}
