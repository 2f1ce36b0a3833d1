//! Cancels the scheduler's shutdown token on SIGINT/SIGTERM (Ctrl-C outside Unix).

use std::io;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Register the signal handlers and spawn a task that cancels `shutdown` on the first signal.
///
/// Registration happens before this returns, so a signal arriving right after startup is not
/// lost. The task also ends quietly when the token is cancelled by someone else.
pub fn install(shutdown: CancellationToken) -> io::Result<JoinHandle<()>> {
    info!("Adding shutdown signal handlers...");
    let signal = wait_for_signal()?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = signal => {}
        }
        info!("Stopping scheduler...");
        shutdown.cancel();
    }))
}

#[cfg(unix)]
fn wait_for_signal() -> io::Result<impl std::future::Future<Output = ()>> {
    use tokio::signal::unix::{
        signal,
        SignalKind,
    };

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => debug!("received SIGINT"),
            _ = sigterm.recv() => debug!("received SIGTERM"),
        }
    })
}

#[cfg(not(unix))]
fn wait_for_signal() -> io::Result<impl std::future::Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => debug!("received Ctrl-C"),
            Err(err) => {
                error!("Failed to listen for Ctrl-C: {err}");
                std::future::pending::<()>().await
            }
        }
    })
}
