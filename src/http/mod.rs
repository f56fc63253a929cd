//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, interceptor chain)
//!     → request.rs (request ID)
//!     → recover.rs (fault isolation, panic capture)
//!     → cors.rs (origin allow-list, preflight)
//!     → auth::authenticate, auth::guards
//!     → handlers.rs
//!     → error.rs (every failure becomes an `{"error": ...}` response)
//! ```

pub mod cors;
pub mod error;
pub mod handlers;
pub mod recover;
pub mod request;
pub mod server;

pub use error::AppError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
