//! The watch-and-deploy session: mount, supervise, poll, tear down.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::deploy::Supervisor;
use crate::mount::ShareMount;
use crate::watcher::PollingWatcher;
use crate::watcher::handlers::DeployHandler;

/// Run until an interrupt arrives or the polling loop ends.
///
/// The share is released on every path out of this function, exactly once.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let mount = ShareMount::new(&settings.watch.mount_point, settings.mount.clone());
    mount.mount().await.context("failed to mount share")?;

    let result = watch_and_deploy(&settings).await;

    mount.release().await;
    result
}

async fn watch_and_deploy(settings: &Settings) -> anyhow::Result<()> {
    let root = settings.watch.mount_point.clone();

    let supervisor = Arc::new(
        Supervisor::load(&root)
            .context("failed to load deploy config")?
            .with_settings(&settings.supervisor),
    );

    let watcher = PollingWatcher::builder()
        .root(&root)
        .interval(settings.watch.poll_interval())
        .handler(Arc::new(DeployHandler::new(supervisor.clone())))
        .build()
        .context("failed to start watcher")?;

    let shutdown = CancellationToken::new();
    let signal_listener = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = shutdown_signal() => {
                    crate::log_event!("shutdown", "received interrupt signal, shutting down");
                    shutdown.cancel();
                }
                _ = shutdown.cancelled() => {}
            }
        }
    });

    if settings.supervisor.deploy_on_start {
        if let Err(e) = supervisor.deploy().await {
            tracing::error!("[supervisor] initial deploy failed: {e}");
        }
    }

    match watcher.watch(shutdown.clone()).await {
        Ok(()) => crate::log_event!("shutdown", "watch ended"),
        Err(e) => tracing::error!("[shutdown] watch ended with error: {e}"),
    }

    shutdown.cancel();
    let _ = signal_listener.await;

    if settings.supervisor.stop_on_exit {
        if let Err(e) = supervisor.kill().await {
            tracing::warn!("[shutdown] failed to stop process: {e}");
        }
    }

    Ok(())
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[shutdown] failed to listen for ctrl+c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("[shutdown] failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
