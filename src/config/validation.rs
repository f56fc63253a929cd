//! Configuration validation.
//!
//! Serde handles syntax; this module checks the values make sense. Every
//! problem is reported, not just the first one.

use std::net::SocketAddr;

use tokio::sync::Semaphore;

use crate::config::schema::AppConfig;

/// Shortest accepted HMAC secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Largest in-flight limit the request semaphore can hold.
pub const MAX_CONNECTIONS: usize = Semaphore::MAX_PERMITS;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("auth.jwt_secret must be set")]
    MissingSecret,
    #[error("auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes long")]
    ShortSecret,
    #[error("auth.issuer must not be empty")]
    EmptyIssuer,
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },
    #[error("{field} is not a socket address: {value}")]
    BadAddress { field: &'static str, value: String },
    #[error("cors.trusted_origins entry {0:?} must start with http:// or https://")]
    BadOrigin(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::MissingSecret);
    } else if config.auth.jwt_secret.len() < MIN_SECRET_LEN {
        errors.push(ValidationError::ShortSecret);
    }
    if config.auth.issuer.trim().is_empty() {
        errors.push(ValidationError::EmptyIssuer);
    }

    let positive = [
        ("auth.token_ttl_secs", config.auth.token_ttl_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.lookup_secs", config.timeouts.lookup_secs),
        ("timeouts.shutdown_secs", config.timeouts.shutdown_secs),
        ("listener.max_connections", config.listener.max_connections as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(field));
        }
    }

    if config.listener.max_connections > MAX_CONNECTIONS {
        errors.push(ValidationError::TooLarge {
            field: "listener.max_connections",
            max: MAX_CONNECTIONS as u64,
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    for origin in &config.cors.trusted_origins {
        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            errors.push(ValidationError::BadOrigin(origin.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
