//! Event bus subscribers.

pub mod deploy;

pub use deploy::{DeployHandler, EventClass};
