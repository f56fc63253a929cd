//! Identity subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → auth::authenticate (token → user id)
//!     → store.rs (UserStore::get, bounded by the lookup timeout)
//!     → user.rs (Identity::User or Identity::Anonymous)
//!     → request extensions, read by guards and handlers
//! ```
//!
//! # Design Decisions
//! - Anonymous callers are a variant, never a placeholder record
//! - Resolved users are read-only and shared behind `Arc`
//! - Password hashes never serialize and never print

pub mod password;
pub mod store;
pub mod user;

pub use password::{PasswordError, PasswordHash};
pub use store::{BoundedStore, MemoryUserStore, NewUser, StoreError, UserStore};
pub use user::{Identity, Role, User};
