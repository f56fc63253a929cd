//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers and route guards
//! - Wire the interceptor chain in a fixed order
//! - Bind the router to a listener and serve until shutdown drains it
//!
//! # Interceptor order (outermost first)
//! ```text
//! request id → trace → metrics            (observational)
//! isolate_faults → catch panic            (nothing escapes as a dropped connection)
//! cors
//! timeout → in-flight limit → authenticate
//! router → route guards → handler
//! ```

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{authenticate, require_authenticated, require_role, Authenticator, TokenCodec};
use crate::catalog::{BoundedCatalog, CatalogStore};
use crate::config::AppConfig;
use crate::http::cors::{cors, CorsPolicy};
use crate::http::error::AppError;
use crate::http::handlers;
use crate::http::recover::{isolate_faults, panic_response};
use crate::http::request::{propagate_request_id, request_span, set_request_id};
use crate::identity::{BoundedStore, Role, UserStore};
use crate::lifecycle::{BackgroundTasks, Shutdown, ShutdownError};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub codec: Arc<TokenCodec>,
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub tasks: BackgroundTasks,
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Every store call made through the server is bounded by
    /// `timeouts.lookup_secs`. Background work is tracked by `shutdown`.
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        catalog: Arc<dyn CatalogStore>,
        shutdown: Shutdown,
    ) -> Self {
        let config = Arc::new(config);
        let lookup = Duration::from_secs(config.timeouts.lookup_secs);

        let state = AppState {
            codec: Arc::new(TokenCodec::new(&config.auth)),
            users: Arc::new(BoundedStore::new(users, lookup)),
            catalog: Arc::new(BoundedCatalog::new(catalog, lookup)),
            tasks: shutdown.tasks().clone(),
            config: config.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let authenticator = Authenticator::new(state.codec.clone(), state.users.clone());
        let policy = CorsPolicy::new(&config.cors);
        let in_flight = Arc::new(Semaphore::new(
            config.listener.max_connections.min(Semaphore::MAX_PERMITS),
        ));

        Router::new()
            .route("/v1/healthcheck", get(handlers::healthcheck))
            .route(
                "/v1/tokens/authentication",
                post(handlers::create_authentication_token),
            )
            .route("/v1/pools", get(handlers::list_pools))
            .route("/v1/groups", get(handlers::list_groups))
            .route("/v1/subscriptions", get(handlers::list_subscriptions))
            .route(
                "/v1/users/me",
                get(handlers::show_current_user)
                    .route_layer(middleware::from_fn(require_authenticated)),
            )
            .route(
                "/v1/trainers",
                get(handlers::list_trainers)
                    .route_layer(middleware::from_fn(require_authenticated)),
            )
            .route(
                "/v1/admin/users",
                get(handlers::list_users)
                    .route_layer(middleware::from_fn_with_state(Role::Admin, require_role)),
            )
            .fallback(handlers::not_found)
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .with_state(state)
            .layer(middleware::from_fn_with_state(authenticator, authenticate))
            .layer(middleware::from_fn_with_state(in_flight, limit_in_flight))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(policy, cors))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn(isolate_faults))
            .layer(middleware::from_fn(track_metrics))
            .layer(propagate_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(set_request_id())
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve until the shutdown coordinator drains the listener and all
    /// background tasks have finished.
    pub async fn run(self, listener: TcpListener) -> Result<(), ShutdownError> {
        let addr = listener.local_addr().map_err(ShutdownError::Serve)?;
        tracing::info!(
            address = %addr,
            environment = self.config.environment.as_str(),
            "HTTP server starting"
        );

        let drain = self.shutdown.clone();
        let serving = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { drain.draining().await })
            .into_future();

        let outcome = self.shutdown.supervise(serving).await;
        tracing::info!("HTTP server stopped");
        outcome
    }
}

/// Rejects with 503 once `max_connections` requests are in flight.
async fn limit_in_flight(
    State(permits): State<Arc<Semaphore>>,
    request: Request,
    next: Next,
) -> Response {
    match permits.try_acquire() {
        Ok(_permit) => next.run(request).await,
        Err(_) => {
            tracing::warn!("In-flight request limit reached");
            AppError::Overloaded.into_response()
        }
    }
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
