//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI flags + SWIMGATE_JWT_SECRET
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed by value to each component at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; nothing reads it from global state
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, AuthConfig, CorsConfig, Environment, ListenerConfig, ObservabilityConfig,
    TimeoutConfig,
};
