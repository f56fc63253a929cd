//! Cross-origin interceptor.
//!
//! Reflects trusted origins back to the browser and answers their preflight
//! requests directly, before authentication sees any credential.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::CorsConfig;

pub const ALLOWED_METHODS: &str = "OPTIONS, PUT, PATCH, DELETE";
pub const ALLOWED_HEADERS: &str = "Authorization, Content-Type";

/// Trusted origins, matched exactly.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    trusted: Arc<HashSet<String>>,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            trusted: Arc::new(config.trusted_origins.iter().cloned().collect()),
        }
    }

    /// The request's origin if it is trusted.
    fn allowed_origin(&self, request: &Request) -> Option<HeaderValue> {
        let origin = request.headers().get(ORIGIN)?;
        let text = origin.to_str().ok()?;
        self.trusted.contains(text).then(|| origin.clone())
    }
}

pub async fn cors(State(policy): State<CorsPolicy>, request: Request, next: Next) -> Response {
    let allowed = policy.allowed_origin(&request);

    let mut response = match &allowed {
        Some(origin) if is_preflight(&request) => {
            tracing::debug!(origin = ?origin, "Answering preflight request");
            preflight_response()
        }
        _ => next.run(request).await,
    };

    let headers = response.headers_mut();
    headers.append(VARY, HeaderValue::from_static("Origin"));
    if let Some(origin) = allowed {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    response
}

fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && request.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

fn preflight_response() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::middleware::from_fn_with_state;
    use axum::routing::any;
    use axum::Router;
    use tower::ServiceExt;

    const TRUSTED: &str = "https://pool.example";

    fn app(hits: Arc<AtomicUsize>) -> Router {
        let policy = CorsPolicy::new(&CorsConfig {
            trusted_origins: vec![TRUSTED.into()],
        });
        Router::new()
            .route(
                "/v1/trainers",
                any(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        "handled"
                    }
                }),
            )
            .layer(from_fn_with_state(policy, cors))
    }

    fn request(method: Method, origin: Option<&str>, preflight: bool) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder()
            .method(method)
            .uri("/v1/trainers");
        if let Some(origin) = origin {
            builder = builder.header(ORIGIN, origin);
        }
        if preflight {
            builder = builder.header(ACCESS_CONTROL_REQUEST_METHOD, "PUT");
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn trusted_preflight_short_circuits() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(hits.clone())
            .oneshot(request(Method::OPTIONS, Some(TRUSTED), true))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], TRUSTED);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_HEADERS], ALLOWED_HEADERS);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn trusted_simple_request_reflects_origin() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(hits.clone())
            .oneshot(request(Method::GET, Some(TRUSTED), false))
            .await
            .unwrap();

        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], TRUSTED);
        assert_eq!(response.headers()[VARY], "Origin");
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn untrusted_origin_passes_through_unmodified() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(hits.clone())
            .oneshot(request(Method::OPTIONS, Some("https://evil.example"), true))
            .await
            .unwrap();

        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn options_without_request_method_is_not_preflight() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(hits.clone())
            .oneshot(request(Method::OPTIONS, Some(TRUSTED), false))
            .await
            .unwrap();

        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], TRUSTED);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
