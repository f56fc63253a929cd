//! Catalog store collaborator.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::catalog::model::{Group, Pool, Subscription};
use crate::identity::store::within;
use crate::identity::StoreError;

#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    /// All pools, ordered by name.
    async fn pools(&self) -> Result<Vec<Pool>, StoreError>;

    /// All training groups, ordered by id.
    async fn groups(&self) -> Result<Vec<Group>, StoreError>;

    /// All subscription plans, ordered by id.
    async fn subscriptions(&self) -> Result<Vec<Subscription>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct NewPool {
    pub name: String,
    pub address: String,
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub category: String,
    pub pool_name: String,
    pub trainer_name: String,
    pub user_id: i64,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub name: String,
    pub visits_per_week: u8,
    pub price: f64,
}

/// In-process catalog. Ids are assigned per record kind, starting at 1.
#[derive(Default)]
pub struct MemoryCatalog {
    pools: DashMap<i64, Pool>,
    groups: DashMap<i64, Group>,
    subscriptions: DashMap<i64, Subscription>,
    next_pool: AtomicI64,
    next_group: AtomicI64,
    next_subscription: AtomicI64,
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

fn sorted_by_id<T: Clone>(map: &DashMap<i64, T>) -> Vec<T> {
    let mut entries: Vec<(i64, T)> = map.iter().map(|e| (*e.key(), e.value().clone())).collect();
    entries.sort_by_key(|(id, _)| *id);
    entries.into_iter().map(|(_, value)| value).collect()
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pool(&self, new: NewPool) -> Pool {
        let pool = Pool {
            id: next_id(&self.next_pool),
            name: new.name,
            address: new.address,
            kind: new.kind,
        };
        self.pools.insert(pool.id, pool.clone());
        pool
    }

    pub fn add_group(&self, new: NewGroup) -> Group {
        let group = Group {
            id: next_id(&self.next_group),
            category: new.category,
            pool_name: new.pool_name,
            trainer_name: new.trainer_name,
            user_id: new.user_id,
            image: new.image,
        };
        self.groups.insert(group.id, group.clone());
        group
    }

    pub fn add_subscription(&self, new: NewSubscription) -> Subscription {
        let subscription = Subscription {
            id: next_id(&self.next_subscription),
            name: new.name,
            visits_per_week: new.visits_per_week,
            price: new.price,
        };
        self.subscriptions.insert(subscription.id, subscription.clone());
        subscription
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn pools(&self) -> Result<Vec<Pool>, StoreError> {
        let mut pools: Vec<Pool> = self.pools.iter().map(|p| p.clone()).collect();
        // Names are not unique; id keeps the order stable.
        pools.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(pools)
    }

    async fn groups(&self) -> Result<Vec<Group>, StoreError> {
        Ok(sorted_by_id(&self.groups))
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        Ok(sorted_by_id(&self.subscriptions))
    }
}

/// Wraps another catalog and bounds each call by `limit`.
pub struct BoundedCatalog {
    inner: Arc<dyn CatalogStore>,
    limit: Duration,
}

impl BoundedCatalog {
    pub fn new(inner: Arc<dyn CatalogStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl CatalogStore for BoundedCatalog {
    async fn pools(&self) -> Result<Vec<Pool>, StoreError> {
        within(self.limit, self.inner.pools()).await
    }

    async fn groups(&self) -> Result<Vec<Group>, StoreError> {
        within(self.limit, self.inner.groups()).await
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        within(self.limit, self.inner.subscriptions()).await
    }
}
