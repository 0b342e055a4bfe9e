//! Application settings.
//!
//! Settings are layered:
//! - Default values
//! - TOML settings file
//! - Environment variable overrides
//! - CLI argument overrides (applied by the caller)
//!
//! These are the settings of the watcher itself. The per-deployment
//! `deploy.json` that lives inside the watched tree is handled by
//! [`crate::deploy::DeployConfig`].
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SHAREDEPLOY_` and use double
//! underscores to separate nested levels:
//! - `SHAREDEPLOY_WATCH__POLL_INTERVAL_SECS=2` sets `watch.poll_interval_secs`
//! - `SHAREDEPLOY_MOUNT__ENABLED=false` sets `mount.enabled`
//! - `SHAREDEPLOY_SUPERVISOR__GRACE_PERIOD_MS=8000` sets `supervisor.grace_period_ms`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file looked up in the current directory.
pub const LOCAL_SETTINGS_FILE: &str = "sharedeploy.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SHAREDEPLOY_";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Settings {
    /// Polling watcher settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Network share mount settings
    #[serde(default)]
    pub mount: MountConfig,

    /// Process supervisor settings
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// Local directory that is watched (the share's mount point)
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,

    /// Seconds between two scans
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MountConfig {
    /// Mount the share before watching. When false the mount point is
    /// treated as a plain local directory.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Remote share, e.g. `//server/share`
    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_username")]
    pub username: String,

    /// Never written back out when settings are saved or printed
    #[serde(default = "default_password", skip_serializing)]
    pub password: String,

    /// Filesystem type passed to `mount -t`
    #[serde(default = "default_fs_type")]
    pub fs_type: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// How long a terminated child gets before it is killed
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Pause between stopping the old child and deploying the new one
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Deploy once at startup instead of waiting for the first change
    #[serde(default)]
    pub deploy_on_start: bool,

    /// Stop the child when the watcher shuts down
    #[serde(default = "default_true")]
    pub stop_on_exit: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for everything
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `"sharedeploy::watcher" = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

// Default value functions
fn default_mount_point() -> PathBuf {
    PathBuf::from("/mnt/agent")
}
fn default_poll_interval_secs() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_server() -> String {
    "//server/share".to_string()
}
fn default_username() -> String {
    "admin".to_string()
}
fn default_password() -> String {
    "admin".to_string()
}
fn default_fs_type() -> String {
    "cifs".to_string()
}
fn default_grace_period_ms() -> u64 {
    5_000
}
fn default_settle_delay_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mount_point: default_mount_point(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: default_server(),
            username: default_username(),
            password: default_password(),
            fs_type: default_fs_type(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            deploy_on_start: false,
            stop_on_exit: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would make tokio's ticker panic
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl SupervisorConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Settings {
    /// Load settings from all sources.
    ///
    /// `explicit` wins over the lookup; a missing explicit file is not an
    /// error, its layer is just empty.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        let config_path = explicit
            .map(Path::to_path_buf)
            .or_else(Self::find_config_file);

        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }

    /// Load settings from a specific file (plus environment overrides).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::load(Some(path.as_ref()))
    }

    /// Locate a settings file: the current directory first, then the user
    /// config directory.
    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_SETTINGS_FILE);
        if local.is_file() {
            return Some(local);
        }

        let user = dirs::config_dir()?.join("sharedeploy").join("settings.toml");
        user.is_file().then_some(user)
    }

    /// Render the settings as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save current settings to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
