//! swimgate: the request pipeline of a swimming-pool management API.
//!
//! Bearer-token authentication, role authorization, CORS, fault isolation
//! and graceful shutdown in front of a small set of JSON routes.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
