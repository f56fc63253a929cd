//! Authentication and authorization subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token>
//!     → authenticate.rs (header shape, verify, user lookup)
//!     → token.rs (signature, issuer, validity window)
//!     → Identity in request extensions
//!     → guards.rs (require_authenticated / require_role, per route)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - No header is anonymous access, not an error
//! - Every credential failure renders the same 401
//! - Store failures are 500s and never look like bad credentials
//! - Guards wrap routes; the role guard implies the authentication guard

pub mod authenticate;
pub mod guards;
pub mod token;

pub use authenticate::{authenticate, Authenticator};
pub use guards::{ensure_authenticated, ensure_role, require_authenticated, require_role};
pub use token::{Claims, TokenCodec, TokenError};
