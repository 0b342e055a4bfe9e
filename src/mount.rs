//! Mounting and releasing the watched network share.
//!
//! The watcher only needs a readable local directory. When mounting is
//! enabled that directory is backed by a remote share for the lifetime of
//! the process and released exactly once on the way out.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::process::Command;

use crate::config::MountConfig;

#[derive(Error, Debug)]
pub enum MountError {
    #[error("Failed to create mount point {path}: {source}")]
    CreateMountPoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run '{command}': {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to mount {server} on {path}: {stderr}")]
    MountFailed {
        server: String,
        path: PathBuf,
        stderr: String,
    },
}

/// A share mounted (or merely located) at a local directory.
#[derive(Debug)]
pub struct ShareMount {
    mount_point: PathBuf,
    config: MountConfig,
    mounted: AtomicBool,
    released: AtomicBool,
}

impl ShareMount {
    pub fn new(mount_point: impl Into<PathBuf>, config: MountConfig) -> Self {
        Self {
            mount_point: mount_point.into(),
            config,
            mounted: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Create the mount point and, if enabled, mount the share on it.
    pub async fn mount(&self) -> Result<(), MountError> {
        std::fs::create_dir_all(&self.mount_point).map_err(|source| {
            MountError::CreateMountPoint {
                path: self.mount_point.clone(),
                source,
            }
        })?;

        if !self.config.enabled {
            crate::log_event!(
                "mount",
                "disabled",
                "watching local directory {}",
                self.mount_point.display()
            );
            return Ok(());
        }

        let credentials = format!(
            "username={},password={}",
            self.config.username, self.config.password
        );

        let output = Command::new("mount")
            .arg("-t")
            .arg(&self.config.fs_type)
            .arg(&self.config.server)
            .arg(&self.mount_point)
            .arg("-o")
            .arg(credentials)
            .output()
            .await
            .map_err(|source| MountError::Command {
                command: "mount".to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(MountError::MountFailed {
                server: self.config.server.clone(),
                path: self.mount_point.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        self.mounted.store(true, Ordering::SeqCst);
        crate::log_event!(
            "mount",
            "mounted",
            "{} on {}",
            self.config.server,
            self.mount_point.display()
        );
        Ok(())
    }

    /// Unmount the share. Only the first call does anything; failures are
    /// logged, never returned, since this runs during shutdown.
    ///
    /// Returns whether this call performed the release.
    pub async fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }

        if !self.mounted.swap(false, Ordering::SeqCst) {
            crate::debug_event!("mount", "nothing to unmount");
            return true;
        }

        crate::log_event!("mount", "unmounting", "{}", self.mount_point.display());

        match Command::new("umount").arg(&self.mount_point).output().await {
            Ok(output) if output.status.success() => {
                crate::log_event!("mount", "unmounted", "{}", self.mount_point.display());
            }
            Ok(output) => {
                tracing::warn!(
                    "[mount] failed to unmount {}: {}",
                    self.mount_point.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(e) => {
                tracing::warn!("[mount] failed to run umount: {e}");
            }
        }
        true
    }
}
