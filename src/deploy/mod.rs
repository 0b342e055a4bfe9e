//! Deployment of the watched sources and supervision of the deployed process.
//!
//! # Architecture
//!
//! ```text
//! DeployHandler (watcher subscriber)
//!   - deploy.json changed  -> reload config, redeploy
//!   - source file changed  -> redeploy
//!         |
//!     Supervisor
//!   - mirror copy source_location -> deploy_location
//!   - spawn child, monitor exit
//!   - SIGTERM, grace period, SIGKILL
//! ```

mod config;
mod copy;
mod error;
mod process;
mod supervisor;

pub use config::{CONFIG_FILE_NAME, DeployConfig};
pub use copy::{CopyStats, mirror_copy};
pub use error::{DeployError, DeployResult};
pub use process::{DISPLAY, display_environment};
pub use supervisor::{DEFAULT_GRACE_PERIOD, DEFAULT_SETTLE_DELAY, Supervisor};
