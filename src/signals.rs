//! OS termination signals as a cancellation source.
//!
//! On Unix, SIGINT, SIGTERM and SIGQUIT are handled, with
//! [`tokio::signal::ctrl_c`] as a fallback. Elsewhere only ctrl-c is awaited.

use tokio_util::sync::CancellationToken;

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Returns a token cancelled when the process receives a termination signal.
///
/// If the signal handlers cannot be installed the token is cancelled right
/// away.
///
/// # Panics
///
/// Panics if called outside of a Tokio runtime.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => tracing::info!("termination signal received"),
            Err(err) => tracing::error!(error = %err, "failed to listen for termination signals"),
        }
        trigger.cancel();
    });
    token
}
