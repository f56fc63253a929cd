//! Shutdown coordination for the server.
//!
//! ```text
//! Running ──trigger()──▶ Draining ──listener closed + tasks idle──▶ Stopped
//! ```
//!
//! Draining stops the accept loop and lets in-flight requests finish, bounded
//! by the close timeout. A failed or timed-out close is kept and returned
//! after background work has drained; it is never dropped. Once the listener
//! is closed no new background work is admitted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::lifecycle::tasks::BackgroundTasks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("server stopped unexpectedly: {0}")]
    Serve(#[source] std::io::Error),
    #[error("listener close failed: {0}")]
    Close(#[source] std::io::Error),
    #[error("listener did not close within {0:?}")]
    CloseTimeout(Duration),
}

/// Coordinator for graceful shutdown. Clones share one state.
#[derive(Debug, Clone)]
pub struct Shutdown {
    state: Arc<watch::Sender<ShutdownState>>,
    tasks: BackgroundTasks,
    close_timeout: Duration,
}

impl Shutdown {
    pub fn new(close_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            state: Arc::new(state),
            tasks: BackgroundTasks::new(),
            close_timeout,
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Background tasks the coordinator waits for before stopping.
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Begin draining. Later calls do nothing.
    pub fn trigger(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::Draining;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Shutdown triggered, draining");
        }
    }

    /// Resolves once draining has begun.
    pub async fn draining(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|s| *s != ShutdownState::Running).await;
    }

    /// Drive `serving` until it stops, then drain background tasks.
    ///
    /// `serving` must itself stop accepting once [`Shutdown::draining`]
    /// resolves, as `axum::serve(..).with_graceful_shutdown(..)` does.
    pub async fn supervise<F>(&self, serving: F) -> Result<(), ShutdownError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(serving);

        let closed = tokio::select! {
            result = &mut serving => match result {
                Ok(()) if self.state() != ShutdownState::Running => Ok(()),
                Ok(()) => Err(ShutdownError::Serve(std::io::Error::other(
                    "server exited without a shutdown signal",
                ))),
                Err(e) if self.state() == ShutdownState::Running => Err(ShutdownError::Serve(e)),
                Err(e) => Err(ShutdownError::Close(e)),
            },
            _ = self.draining() => {
                match tokio::time::timeout(self.close_timeout, &mut serving).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(ShutdownError::Close(e)),
                    Err(_) => Err(ShutdownError::CloseTimeout(self.close_timeout)),
                }
            }
        };

        if let Err(e) = &closed {
            tracing::error!(error = %e, "Listener did not close cleanly");
        }

        // Draining covers the case where the server died on its own.
        self.trigger();
        // Connections left behind by a timed-out close may still run handlers.
        self.tasks.close();

        tracing::info!(
            outstanding = self.tasks.outstanding(),
            "Completing background tasks"
        );
        self.tasks.wait_idle().await;

        self.state.send_replace(ShutdownState::Stopped);
        match &closed {
            Ok(()) => tracing::info!("Stopped cleanly"),
            Err(e) => tracing::warn!(error = %e, "Stopped after shutdown failure"),
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn trigger_is_idempotent() {
        let shutdown = Shutdown::new(Duration::from_secs(1));
        assert_eq!(shutdown.state(), ShutdownState::Running);
        shutdown.trigger();
        shutdown.trigger();
        assert_eq!(shutdown.state(), ShutdownState::Draining);
        shutdown.draining().await;
    }

    #[tokio::test]
    async fn clean_close_then_tasks_then_stopped() {
        let shutdown = Shutdown::new(Duration::from_secs(5));
        let task_done = Arc::new(AtomicBool::new(false));

        let flag = task_done.clone();
        shutdown.tasks().spawn("slow", async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let serving = {
            let shutdown = shutdown.clone();
            async move {
                shutdown.draining().await;
                Ok(())
            }
        };

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        shutdown.supervise(serving).await.unwrap();
        assert!(task_done.load(Ordering::SeqCst));
        assert_eq!(shutdown.state(), ShutdownState::Stopped);
    }

    #[tokio::test]
    async fn close_failure_is_reported_after_draining() {
        let shutdown = Shutdown::new(Duration::from_secs(5));
        let task_done = Arc::new(AtomicBool::new(false));
        let flag = task_done.clone();
        shutdown.tasks().spawn("post-request", async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let serving = {
            let shutdown = shutdown.clone();
            async move {
                shutdown.draining().await;
                Err(std::io::Error::other("socket close failed"))
            }
        };
        shutdown.trigger();

        let err = shutdown.supervise(serving).await.unwrap_err();
        assert!(matches!(err, ShutdownError::Close(_)));
        assert!(task_done.load(Ordering::SeqCst));
        assert_eq!(shutdown.state(), ShutdownState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_bounded_by_timeout() {
        let shutdown = Shutdown::new(Duration::from_secs(20));
        shutdown.trigger();

        let err = shutdown
            .supervise(std::future::pending::<std::io::Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, ShutdownError::CloseTimeout(d) if d == Duration::from_secs(20)));
        assert_eq!(shutdown.state(), ShutdownState::Stopped);
        assert!(shutdown.tasks().spawn("straggler", async {}).is_none());
    }

    #[tokio::test]
    async fn server_error_while_running_is_a_serve_failure() {
        let shutdown = Shutdown::new(Duration::from_secs(1));
        let err = shutdown
            .supervise(async { Err(std::io::Error::other("accept failed")) })
            .await
            .unwrap_err();
        assert!(matches!(err, ShutdownError::Serve(_)));
        assert_eq!(shutdown.state(), ShutdownState::Stopped);
    }
}
