//! Command-line entry: argument parsing and the watch session.

pub mod args;
pub mod run;

pub use args::Cli;
pub use run::run;
