//! Poll a mounted share for changes and keep one deployed process in sync
//! with it.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod logging;
pub mod mount;
pub mod watcher;

pub use config::Settings;
pub use deploy::{DeployConfig, DeployError, Supervisor};
pub use watcher::{ChangeEvent, ChangeKind, PollingWatcher, WatchError, WatchHandler};
