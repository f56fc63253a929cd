//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order (metrics, store, seed data)
//! - Install signal handlers before traffic is accepted
//! - Bind the listener last and hand over to the server
//!
//! Any startup error is fatal and surfaces as a [`StartupError`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::catalog::MemoryCatalog;
use crate::config::AppConfig;
use crate::http::HttpServer;
use crate::identity::password::{DEFAULT_COST, MAX_PASSWORD_LEN};
use crate::identity::{MemoryUserStore, NewUser, PasswordHash, Role, User, UserStore};
use crate::lifecycle::{signals, Shutdown, ShutdownError};
use crate::observability::metrics;

/// Password for the account created by `--seed-admin`.
pub const ADMIN_PASSWORD_ENV: &str = "SWIMGATE_ADMIN_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
    #[error("failed to seed admin account: {0}")]
    Seed(String),
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// An administrator account created before the listener opens.
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl AdminSeed {
    /// Pair `email` with the password from [`ADMIN_PASSWORD_ENV`].
    pub fn from_env(email: String) -> Result<Self, StartupError> {
        let password = std::env::var(ADMIN_PASSWORD_ENV)
            .map_err(|_| StartupError::Seed(format!("{} must be set", ADMIN_PASSWORD_ENV)))?;
        Ok(Self { email, password })
    }
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub async fn seed_admin(
    store: &dyn UserStore,
    seed: AdminSeed,
    cost: u32,
) -> Result<User, StartupError> {
    if !(8..=MAX_PASSWORD_LEN).contains(&seed.password.len()) {
        return Err(StartupError::Seed(format!(
            "password must be between 8 and {} bytes",
            MAX_PASSWORD_LEN
        )));
    }

    let password = seed.password;
    let hash = tokio::task::spawn_blocking(move || PasswordHash::new(&password, cost))
        .await
        .map_err(|e| StartupError::Seed(e.to_string()))?
        .map_err(|e| StartupError::Seed(e.to_string()))?;

    let user = store
        .insert(NewUser {
            full_name: "Administrator".into(),
            email: seed.email,
            password: hash,
            role: Role::Admin,
            image: None,
        })
        .await
        .map_err(|e| StartupError::Seed(e.to_string()))?;

    tracing::info!(user_id = user.id, email = %user.email, "Admin account seeded");
    Ok(user)
}

/// Start every subsystem and serve until shutdown completes.
pub async fn run(config: AppConfig, seed: Option<AdminSeed>) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(MemoryUserStore::new());
    if let Some(seed) = seed {
        seed_admin(store.as_ref(), seed, DEFAULT_COST).await?;
    }

    let shutdown = Shutdown::new(Duration::from_secs(config.timeouts.shutdown_secs));
    signals::listen(shutdown.clone()).map_err(StartupError::Signals)?;

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let catalog = Arc::new(MemoryCatalog::new());
    HttpServer::new(config, store, catalog, shutdown)
        .run(listener)
        .await?;
    Ok(())
}
