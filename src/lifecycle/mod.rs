//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     metrics → store + seed → signal handlers → bind → HttpServer::run
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Running → Draining (stop accepting, bounded listener close)
//!             → wait for background tasks (tasks.rs)
//!             → Stopped, outcome returned to main
//! ```
//!
//! # Design Decisions
//! - Listener close has a ceiling; admitted background work does not
//! - A close failure is reported only after background work has finished
//! - Background work is counted, never detached

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod tasks;

pub use shutdown::{Shutdown, ShutdownError, ShutdownState};
pub use startup::{AdminSeed, StartupError};
pub use tasks::BackgroundTasks;
