//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use swimgate::auth::TokenCodec;
use swimgate::catalog::{CatalogStore, MemoryCatalog};
use swimgate::config::AppConfig;
use swimgate::http::HttpServer;
use swimgate::identity::{MemoryUserStore, NewUser, PasswordHash, Role, User, UserStore};
use swimgate::lifecycle::{Shutdown, ShutdownError};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "pa55word-long";
pub const TRUSTED_ORIGIN: &str = "http://localhost:3000";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.into();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.cors.trusted_origins = vec![TRUSTED_ORIGIN.into()];
    config.timeouts.shutdown_secs = 5;
    config
}

/// One user per role, all sharing [`PASSWORD`].
pub struct Seeded {
    pub member: User,
    pub trainer: User,
    pub admin: User,
}

async fn insert(
    store: &MemoryUserStore,
    hash: &PasswordHash,
    name: &str,
    email: &str,
    role: Role,
) -> User {
    store
        .insert(NewUser {
            full_name: name.into(),
            email: email.into(),
            password: hash.clone(),
            role,
            image: None,
        })
        .await
        .unwrap()
}

pub async fn seed(store: &MemoryUserStore) -> Seeded {
    let hash = PasswordHash::new(PASSWORD, 4).unwrap();
    Seeded {
        member: insert(store, &hash, "Marta Member", "member@example.com", Role::Member).await,
        trainer: insert(store, &hash, "Tom Trainer", "trainer@example.com", Role::Trainer)
            .await,
        admin: insert(store, &hash, "Ada Admin", "admin@example.com", Role::Admin).await,
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ShutdownError>>,
    codec: TokenCodec,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token_for(&self, user_id: i64) -> String {
        self.codec.issue(user_id).unwrap()
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }
}

/// Serve `store` and an empty catalog on an ephemeral port.
pub async fn spawn_server(config: AppConfig, store: Arc<dyn UserStore>) -> TestServer {
    spawn_server_with(config, store, Arc::new(MemoryCatalog::new())).await
}

pub async fn spawn_server_with(
    config: AppConfig,
    store: Arc<dyn UserStore>,
    catalog: Arc<dyn CatalogStore>,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let codec = TokenCodec::new(&config.auth);
    let shutdown = Shutdown::new(Duration::from_secs(config.timeouts.shutdown_secs));

    let server = HttpServer::new(config, store, catalog, shutdown.clone());
    let handle = tokio::spawn(server.run(listener));

    TestServer {
        addr,
        shutdown,
        handle,
        codec,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
