//! Process shutdown: wait for a termination signal, then close a [`LoopOwner`]
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`. **Elsewhere:** Ctrl-C.

use std::time::Duration;

use crate::engine::DisposeReport;
use crate::owner::LoopOwner;

/// Completes when the process receives a termination signal
///
/// Each call installs independent listeners. Errors if a listener cannot be registered.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Completes when the process receives a termination signal
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Close `owner` when a termination signal arrives, or after `limit` if one is given
///
/// If the signal listeners cannot be installed the owner is still closed before the
/// error is returned, so its loops never outlive this call.
pub async fn close_on_shutdown<O>(
    owner: &O,
    limit: Option<Duration>,
) -> std::io::Result<DisposeReport>
where
    O: LoopOwner + ?Sized,
{
    let waited = match limit {
        Some(limit) => tokio::select! {
            res = wait_for_shutdown_signal() => res.map(|_| "signal"),
            _ = tokio::time::sleep(limit) => Ok("time limit"),
        },
        None => wait_for_shutdown_signal().await.map(|_| "signal"),
    };

    match waited {
        Ok(cause) => {
            tracing::info!(cause = cause, "Shutting down loop owner");
            Ok(owner.close().await)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers, closing now");
            owner.close().await;
            Err(e)
        }
    }
}
