//! Graceful shutdown against a live listener.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use time::OffsetDateTime;

use swimgate::identity::{MemoryUserStore, NewUser, Role, StoreError, User, UserStore};
use swimgate::lifecycle::{ShutdownError, ShutdownState};

mod common;

use common::{client, seed, spawn_server, test_config, PASSWORD};

/// Delays email lookups and login bookkeeping so work is in flight when
/// shutdown begins.
struct SlowStore {
    inner: Arc<MemoryUserStore>,
    lookup_delay: Duration,
    login_delay: Duration,
}

#[async_trait]
impl UserStore for SlowStore {
    async fn get(&self, id: i64) -> Result<User, StoreError> {
        self.inner.get(id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        tokio::time::sleep(self.lookup_delay).await;
        self.inner.get_by_email(email).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.inner.insert(user).await
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        self.inner.list(role).await
    }

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        tokio::time::sleep(self.login_delay).await;
        self.inner.record_login(id, at).await
    }
}

#[tokio::test]
async fn in_flight_request_and_background_work_finish_before_stop() {
    let inner = Arc::new(MemoryUserStore::new());
    let seeded = seed(&inner).await;
    let store = Arc::new(SlowStore {
        inner: inner.clone(),
        lookup_delay: Duration::from_millis(300),
        login_delay: Duration::from_millis(300),
    });
    let server = spawn_server(test_config(), store).await;

    let request = tokio::spawn(
        client()
            .post(server.url("/v1/tokens/authentication"))
            .json(&json!({ "email": "member@example.com", "password": PASSWORD }))
            .send(),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    server.shutdown.trigger();
    assert_eq!(server.shutdown.state(), ShutdownState::Draining);

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let outcome = server.handle.await.unwrap();
    assert!(outcome.is_ok(), "unexpected outcome: {:?}", outcome);
    assert_eq!(server.shutdown.state(), ShutdownState::Stopped);

    // The login write was admitted before draining and must have completed.
    assert!(inner.last_login(seeded.member.id).is_some());

    assert!(tokio::net::TcpStream::connect(server.addr).await.is_err());
}

#[tokio::test]
async fn idle_server_stops_cleanly() {
    let store = Arc::new(MemoryUserStore::new());
    let server = spawn_server(test_config(), store).await;

    let response = client().get(server.url("/v1/healthcheck")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    server.shutdown.trigger();
    let outcome = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn stuck_request_surfaces_close_timeout() {
    let inner = Arc::new(MemoryUserStore::new());
    seed(&inner).await;
    let store = Arc::new(SlowStore {
        inner,
        lookup_delay: Duration::from_secs(30),
        login_delay: Duration::ZERO,
    });

    let mut config = test_config();
    config.timeouts.shutdown_secs = 1;
    let server = spawn_server(config, store).await;

    let _stuck = tokio::spawn(
        client()
            .post(server.url("/v1/tokens/authentication"))
            .json(&json!({ "email": "member@example.com", "password": PASSWORD }))
            .send(),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    server.shutdown.trigger();

    let outcome = tokio::time::timeout(Duration::from_secs(10), server.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, Err(ShutdownError::CloseTimeout(d)) if d == Duration::from_secs(1)));
    assert_eq!(server.shutdown.state(), ShutdownState::Stopped);
}
