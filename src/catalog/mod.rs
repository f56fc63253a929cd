//! Catalog subsystem: pools, training groups and subscription plans.
//!
//! # Data Flow
//! ```text
//! GET /v1/pools | /v1/groups | /v1/subscriptions
//!     → http::handlers (list_*)
//!     → store.rs (CatalogStore, bounded by the lookup timeout)
//!     → model.rs records, serialized inside a named envelope
//! ```
//!
//! The records are read-only here. Whatever owns them (a relational store
//! in production) sits behind [`CatalogStore`].

pub mod model;
pub mod store;

pub use model::{Group, Pool, Subscription};
pub use store::{BoundedCatalog, CatalogStore, MemoryCatalog, NewGroup, NewPool, NewSubscription};
