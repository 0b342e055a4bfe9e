//! Single-process deploy supervisor.
//!
//! Owns at most one child at a time and moves it through
//! copy → start → monitor → terminate → restart.
//!
//! # Locking
//!
//! ```text
//! redeploy_gate   serializes whole redeploys (kill + settle + deploy)
//! state           guards the current handle and the running flag;
//!                 held for the full duration of deploy() and kill()
//! ```
//!
//! The exit monitor owns the `Child`. Stop signals are sent to it over a
//! control channel and delivered only while the child is unreaped, so a
//! signal never reaches a recycled pid. It publishes the exit on a watch
//! channel first and only then takes `state` to clear `running`, so a
//! `kill()` that holds the lock while waiting for that exit cannot deadlock
//! with it.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::process::Child;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::time::timeout;

use super::config::{CONFIG_FILE_NAME, DeployConfig};
use super::copy::mirror_copy;
use super::error::{DeployError, DeployResult};
use super::process;
use crate::config::SupervisorConfig;

/// Default wait between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Default pause between kill and deploy during a redeploy.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// How long to wait for the exit to be observed after SIGKILL.
const FORCE_KILL_WAIT: Duration = Duration::from_secs(2);

/// Signal the monitor delivers to the child it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopSignal {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    Kill,
}

type ControlMessage = (StopSignal, oneshot::Sender<Result<(), String>>);

/// Handle to the supervised child. The `Child` itself lives in the monitor.
#[derive(Debug)]
struct ProcessHandle {
    pid: u32,
    generation: u64,
    exited: watch::Receiver<bool>,
    control: mpsc::UnboundedSender<ControlMessage>,
}

impl ProcessHandle {
    /// Have the monitor signal the child. A child that is already reaped
    /// counts as signalled.
    async fn signal(&self, signal: StopSignal) -> Result<(), String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.control.send((signal, reply_tx)).is_err() {
            return Ok(());
        }
        reply_rx.await.unwrap_or(Ok(()))
    }

    fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Wait up to `limit` for the exit. Returns whether it was observed.
    async fn wait_for_exit(&self, limit: Duration) -> bool {
        let mut exited = self.exited.clone();
        // The monitor sends `true` before dropping the sender
        timeout(limit, exited.wait_for(|done| *done)).await.is_ok()
    }
}

#[derive(Debug, Default)]
struct SupervisorState {
    current: Option<ProcessHandle>,
    running: bool,
}

/// Deploys the source subtree and keeps one child process running.
pub struct Supervisor {
    root: PathBuf,
    config: RwLock<Arc<DeployConfig>>,
    state: Arc<Mutex<SupervisorState>>,
    redeploy_gate: Mutex<()>,
    next_generation: AtomicU64,
    grace_period: Duration,
    settle_delay: Duration,
}

impl Supervisor {
    /// Create a supervisor for the tree at `root` with an already loaded config.
    pub fn new(root: impl Into<PathBuf>, config: DeployConfig) -> Self {
        Self {
            root: root.into(),
            config: RwLock::new(Arc::new(config)),
            state: Arc::new(Mutex::new(SupervisorState::default())),
            redeploy_gate: Mutex::new(()),
            next_generation: AtomicU64::new(1),
            grace_period: DEFAULT_GRACE_PERIOD,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Load `deploy.json` from `root` and create a supervisor.
    ///
    /// Used at startup, where a missing or broken config is fatal.
    pub fn load(root: impl Into<PathBuf>) -> DeployResult<Self> {
        let root = root.into();
        let config = DeployConfig::load(&root)?;
        crate::log_event!(
            "supervisor",
            "config loaded",
            "{}",
            root.join(CONFIG_FILE_NAME).display()
        );
        Ok(Self::new(root, config))
    }

    /// Override the termination grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Override the pause between kill and deploy.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Apply the timing values from the settings file.
    pub fn with_settings(self, settings: &SupervisorConfig) -> Self {
        self.with_grace_period(settings.grace_period())
            .with_settle_delay(settings.settle_delay())
    }

    /// The config currently in effect.
    pub fn config(&self) -> Arc<DeployConfig> {
        self.config.read().clone()
    }

    /// Re-read `deploy.json`. On failure the previous config stays active.
    pub fn reload_config(&self) -> DeployResult<Arc<DeployConfig>> {
        let config = Arc::new(DeployConfig::load(&self.root)?);
        *self.config.write() = config.clone();
        Ok(config)
    }

    /// Copy the sources and start the child.
    ///
    /// Returns the new child's pid. Fails without starting anything when the
    /// copy fails, and refuses to start a second child while one is alive.
    pub async fn deploy(&self) -> DeployResult<u32> {
        let mut state = self.state.lock().await;

        if let Some(handle) = &state.current {
            if !handle.has_exited() {
                return Err(DeployError::AlreadyRunning { pid: handle.pid });
            }
        }
        // Whatever is left is a child that exited on its own
        state.current = None;
        state.running = false;

        let config = self.config();
        let source = config.source_dir(&self.root);
        let target = config.deploy_location.clone();

        crate::log_event!(
            "supervisor",
            "copying",
            "{} -> {}",
            source.display(),
            target.display()
        );
        let stats = tokio::task::spawn_blocking(move || mirror_copy(&source, &target)).await??;
        crate::debug_event!(
            "supervisor",
            "copied",
            "{} files in {} dirs, {} bytes",
            stats.files,
            stats.dirs,
            stats.bytes
        );

        crate::log_event!(
            "supervisor",
            "starting",
            "{} {:?}",
            config.executable.display(),
            config.args
        );
        let child = process::build_command(&config)
            .spawn()
            .map_err(|source| DeployError::Spawn {
                executable: config.executable.clone(),
                source,
            })?;

        let pid = child.id().ok_or_else(|| DeployError::Spawn {
            executable: config.executable.clone(),
            source: std::io::Error::other("child exited before its pid was read"),
        })?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (exit_tx, exit_rx) = watch::channel(false);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        tokio::spawn(monitor(
            child,
            pid,
            generation,
            self.state.clone(),
            exit_tx,
            control_rx,
        ));

        state.current = Some(ProcessHandle {
            pid,
            generation,
            exited: exit_rx,
            control: control_tx,
        });
        state.running = true;

        crate::log_event!("supervisor", "started", "pid {pid}");
        Ok(pid)
    }

    /// Stop the current child: SIGTERM, wait the grace period, then SIGKILL.
    ///
    /// A no-op when nothing was deployed. The handle and the running flag
    /// are cleared on every path, including the error path.
    pub async fn kill(&self) -> DeployResult<()> {
        let mut state = self.state.lock().await;

        let Some(handle) = state.current.take() else {
            crate::debug_event!("supervisor", "no process to kill");
            return Ok(());
        };
        state.running = false;

        self.stop(&handle).await
    }

    async fn stop(&self, handle: &ProcessHandle) -> DeployResult<()> {
        let pid = handle.pid;

        if handle.has_exited() {
            crate::debug_event!("supervisor", "already exited", "pid {pid}");
            return Ok(());
        }

        crate::log_event!("supervisor", "stopping", "pid {pid}");

        match handle.signal(StopSignal::Terminate).await {
            Ok(()) => {
                if handle.wait_for_exit(self.grace_period).await {
                    crate::log_event!("supervisor", "terminated", "pid {pid}");
                    return Ok(());
                }
                tracing::warn!(
                    "[supervisor] pid {pid} did not exit within {:?}, force killing",
                    self.grace_period
                );
            }
            Err(e) => {
                tracing::warn!("[supervisor] failed to terminate pid {pid}: {e}, force killing");
            }
        }

        handle
            .signal(StopSignal::Kill)
            .await
            .map_err(|reason| DeployError::Kill { pid, reason })?;

        if handle.wait_for_exit(FORCE_KILL_WAIT).await {
            crate::log_event!("supervisor", "killed", "pid {pid}");
        } else {
            tracing::warn!("[supervisor] pid {pid} was killed but its exit was not observed");
        }
        Ok(())
    }

    /// Kill, let ports and file handles settle, deploy.
    ///
    /// Concurrent callers are served one after another, each running the
    /// full sequence.
    pub async fn redeploy(&self) -> DeployResult<u32> {
        let _gate = self.redeploy_gate.lock().await;

        crate::log_event!("supervisor", "redeploying");

        if let Err(e) = self.kill().await {
            tracing::error!("[supervisor] error killing existing process: {e}");
        }

        tokio::time::sleep(self.settle_delay).await;

        self.deploy().await
    }

    /// Whether the last started child is still running. Informational only.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Pid of the current handle, if any (it may already have exited).
    pub async fn current_pid(&self) -> Option<u32> {
        self.state.lock().await.current.as_ref().map(|h| h.pid)
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("root", &self.root)
            .field("grace_period", &self.grace_period)
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

/// Await the child's exit while serving stop signals, publish the exit,
/// then clear `running` if this child is still the current one.
async fn monitor(
    mut child: Child,
    pid: u32,
    generation: u64,
    state: Arc<Mutex<SupervisorState>>,
    exited: watch::Sender<bool>,
    mut control: mpsc::UnboundedReceiver<ControlMessage>,
) {
    let outcome = loop {
        tokio::select! {
            outcome = child.wait() => break outcome,
            Some((signal, reply)) = control.recv() => {
                let result = match signal {
                    StopSignal::Terminate => process::terminate(pid),
                    StopSignal::Kill => child.start_kill().map_err(|e| format!("SIGKILL: {e}")),
                };
                let _ = reply.send(result);
            }
        }
    };
    let _ = exited.send(true);

    match outcome {
        Ok(status) if status.success() => {
            crate::log_event!("process", "exited normally", "pid {pid}");
        }
        Ok(status) => {
            tracing::warn!("[process] pid {pid} exited with error: {status}");
        }
        Err(e) => {
            tracing::error!("[process] failed waiting for pid {pid}: {e}");
        }
    }

    let mut state = state.lock().await;
    if state
        .current
        .as_ref()
        .is_some_and(|handle| handle.generation == generation)
    {
        state.running = false;
    }
}
