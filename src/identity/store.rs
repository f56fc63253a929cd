//! User store collaborator.
//!
//! The pipeline only needs lookups by id and by email; the relational store
//! behind them lives outside this crate. [`MemoryUserStore`] backs tests and
//! local runs, and [`BoundedStore`] puts a deadline on every call so a stalled
//! backend cannot pin a request task.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;

use crate::identity::password::PasswordHash;
use crate::identity::user::{Role, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Fields supplied when creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password: PasswordHash,
    pub role: Role,
    pub image: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn get(&self, id: i64) -> Result<User, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// All users, or only those holding `role`, ordered by id.
    async fn list(&self, role: Option<Role>) -> Result<Vec<User>, StoreError>;

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError>;
}

/// In-process store keyed by id with a unique email index.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<i64, User>,
    emails: DashMap<String, i64>,
    logins: DashMap<i64, OffsetDateTime>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded login for `id`, if any.
    pub fn last_login(&self, id: i64) -> Option<OffsetDateTime> {
        self.logins.get(&id).map(|at| *at)
    }

    /// Drop a user, as an account deletion would.
    pub fn remove(&self, id: i64) -> Option<User> {
        let (_, user) = self.users.remove(&id)?;
        self.emails.remove(&user.email);
        self.logins.remove(&id);
        Some(user)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, id: i64) -> Result<User, StoreError> {
        self.users
            .get(&id)
            .map(|u| u.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let id = *self.emails.get(email).ok_or(StoreError::NotFound)?;
        self.get(id).await
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        use dashmap::mapref::entry::Entry;

        // Holding the email entry keeps concurrent inserts of one address serialized.
        let slot = match self.emails.entry(new.email.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateEmail),
            Entry::Vacant(slot) => slot,
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User {
            id,
            created_at: OffsetDateTime::now_utc(),
            full_name: new.full_name,
            email: new.email,
            password: new.password,
            role: new.role,
            image: new.image,
        };
        self.users.insert(id, user.clone());
        slot.insert(id);
        Ok(user)
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .map(|u| u.clone())
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        if !self.users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        self.logins.insert(id, at);
        Ok(())
    }
}

/// Wraps another store and bounds each call by `limit`.
pub struct BoundedStore {
    inner: Arc<dyn UserStore>,
    limit: Duration,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn UserStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        within(self.limit, op).await
    }
}

/// Run a store call, failing with [`StoreError::Timeout`] after `limit`.
pub(crate) async fn within<T, F>(limit: Duration, op: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, op)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

#[async_trait]
impl UserStore for BoundedStore {
    async fn get(&self, id: i64) -> Result<User, StoreError> {
        self.bounded(self.inner.get(id)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.bounded(self.inner.get_by_email(email)).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.bounded(self.inner.insert(user)).await
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        self.bounded(self.inner.list(role)).await
    }

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        self.bounded(self.inner.record_login(id, at)).await
    }
}
