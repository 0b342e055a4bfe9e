//! CLI argument parsing using clap.

use clap::{
    Parser,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::config::Settings;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Mount a share, watch it by polling, and keep the deployed process current.
#[derive(Parser, Debug, Default)]
#[command(name = "sharedeploy", version, styles = clap_cargo_style())]
#[command(about = "Mount a share, watch it by polling, and keep the deployed process current")]
pub struct Cli {
    /// Settings file (defaults to ./sharedeploy.toml, then the user config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Local mount point path
    #[arg(long, value_name = "DIR")]
    pub mount: Option<PathBuf>,

    /// SMB share path (//server/share)
    #[arg(long)]
    pub server: Option<String>,

    /// SMB username
    #[arg(long)]
    pub user: Option<String>,

    /// SMB password
    #[arg(long, env = "SHAREDEPLOY_PASSWORD", hide_env_values = true)]
    pub pass: Option<String>,

    /// Share type passed to mount -t
    #[arg(long = "type", value_name = "TYPE")]
    pub fs_type: Option<String>,

    /// Poll interval in seconds
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Watch the mount point as a plain directory without mounting anything
    #[arg(long)]
    pub no_mount: bool,

    /// Deploy once at startup instead of waiting for the first change
    #[arg(long)]
    pub deploy_on_start: bool,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Load layered settings and apply CLI overrides on top.
    pub fn settings(&self) -> Result<Settings, Box<figment::Error>> {
        let mut settings = Settings::load(self.config.as_deref())?;
        self.apply(&mut settings);
        Ok(settings)
    }

    /// Apply flags that were given; absent flags leave settings untouched.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(mount) = &self.mount {
            settings.watch.mount_point = mount.clone();
        }
        if let Some(interval) = self.interval {
            settings.watch.poll_interval_secs = interval;
        }
        if let Some(server) = &self.server {
            settings.mount.server = server.clone();
        }
        if let Some(user) = &self.user {
            settings.mount.username = user.clone();
        }
        if let Some(pass) = &self.pass {
            settings.mount.password = pass.clone();
        }
        if let Some(fs_type) = &self.fs_type {
            settings.mount.fs_type = fs_type.clone();
        }
        if self.no_mount {
            settings.mount.enabled = false;
        }
        if self.deploy_on_start {
            settings.supervisor.deploy_on_start = true;
        }
    }
}
