//! Child process plumbing: command construction and signals.

use std::process::Stdio;

use tokio::process::Command;

use super::config::DeployConfig;

/// X display the child renders on.
pub const DISPLAY: &str = ":0";

/// Environment variables appended for every child, after the configured
/// ones, so a graphical program can reach the session's X server.
pub fn display_environment() -> Vec<(String, String)> {
    let user = std::env::var("USER").unwrap_or_default();
    vec![
        ("DISPLAY".to_string(), DISPLAY.to_string()),
        ("XAUTHORITY".to_string(), format!("/home/{user}/.Xauthority")),
    ]
}

/// Build the command for `config`.
///
/// The child inherits the current environment, then the configured entries
/// and the display variables are applied in that order (later entries win).
/// It runs inside the deploy location and shares our stdout/stderr.
pub fn build_command(config: &DeployConfig) -> Command {
    let mut command = Command::new(&config.executable);
    command
        .args(&config.args)
        .current_dir(&config.deploy_location)
        .envs(config.environment())
        .envs(display_environment())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    command
}

/// Ask the process to exit (SIGTERM).
///
/// Only call this while the child is still owned and unreaped, otherwise
/// the pid may already belong to another process.
#[cfg(unix)]
pub fn terminate(pid: u32) -> Result<(), String> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| format!("pid {pid} out of range"))?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|e| format!("SIGTERM: {e}"))
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> Result<(), String> {
    Err("graceful termination is not supported on this platform".to_string())
}
