//! Tracking of background work spawned by requests.
//!
//! Each spawned task holds a guard for its whole lifetime; the shutdown
//! coordinator closes the set, then waits for the count to reach zero before
//! declaring the process stopped. A closed set refuses new work.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::observability::metrics;

#[derive(Debug, Default)]
struct Inner {
    outstanding: AtomicU64,
    closed: AtomicBool,
    idle: Notify,
}

/// Counted set of outstanding background tasks. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` on the runtime, counted until it finishes.
    ///
    /// A panic inside the task is logged and swallowed. Returns `None`, and
    /// drops `task` unrun, once the set has been closed.
    pub fn spawn<F>(&self, name: &'static str, task: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Count first, then check: `close` stores the flag before reading the
        // count, so either this spawn is refused or `wait_idle` sees it.
        let guard = self.track();
        if self.is_closed() {
            drop(guard);
            tracing::warn!(task = name, "Background task refused, shutdown in progress");
            return None;
        }
        Some(tokio::spawn(async move {
            let _guard = guard;
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                tracing::error!(task = name, panic = %detail, "Background task panicked");
            }
        }))
    }

    /// Refuse all further spawns. Tasks already running are unaffected.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn track(&self) -> TaskGuard {
        let now = self.inner.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_background_tasks(now);
        TaskGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of tasks spawned and not yet finished.
    pub fn outstanding(&self) -> u64 {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Resolve once no tasks are outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Releases one slot when dropped, including during unwinding.
struct TaskGuard {
    inner: Arc<Inner>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let left = self.inner.outstanding.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_background_tasks(left);
        if left == 0 {
            self.inner.idle.notify_waiters();
        }
    }
}
