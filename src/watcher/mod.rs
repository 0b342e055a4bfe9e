//! Polling file watcher.
//!
//! Periodically snapshots a directory tree, diffs consecutive snapshots and
//! delivers the resulting change events to subscribers in order.
//!
//! # Architecture
//!
//! ```text
//! PollingWatcher (interval ticker)
//!   - scan()            root -> Snapshot
//!   - ChangeDetector    previous + current -> [ChangeEvent]
//!   - EventBus          ChangeEvent -> subscribers, in order
//!         |
//!    +---------+
//!    |         |
//! DeployHandler ...
//! ```

mod bus;
mod detector;
mod error;
mod event;
mod handler;
pub mod handlers;
mod poller;
mod snapshot;

pub use bus::EventBus;
pub use detector::{ChangeDetector, diff};
pub use error::WatchError;
pub use event::{ChangeEvent, ChangeKind, FileState};
pub use handler::WatchHandler;
pub use poller::{PollingWatcher, PollingWatcherBuilder};
pub use snapshot::{Snapshot, scan};
