//! OS signal handling.
//!
//! SIGINT and SIGTERM both begin a graceful shutdown. Handlers are installed
//! before serving starts so a failure to install them is a startup error.

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Install termination handlers and trigger `shutdown` on the first signal.
#[cfg(unix)]
pub fn listen(shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "Shutdown signal received");
        shutdown.trigger();
    }))
}

#[cfg(not(unix))]
pub fn listen(shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!(signal = "ctrl-c", "Shutdown signal received");
                shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for ctrl-c"),
        }
    }))
}
