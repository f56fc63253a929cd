//! Authentication interceptor.
//!
//! Resolves exactly one [`Identity`] per request. A missing header means
//! anonymous access; a present but unusable credential is rejected with one
//! generic 401 regardless of why it failed.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, VARY};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::token::TokenCodec;
use crate::http::error::AppError;
use crate::identity::{Identity, StoreError, UserStore};
use crate::observability::metrics;

/// Everything the interceptor needs, fixed at construction.
#[derive(Clone)]
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(codec: Arc<TokenCodec>, users: Arc<dyn UserStore>) -> Self {
        Self { codec, users }
    }

    /// Work out who is calling from the request headers.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, AppError> {
        let value = match headers.get(AUTHORIZATION) {
            None => return Ok(Identity::Anonymous),
            Some(v) if v.is_empty() => return Ok(Identity::Anonymous),
            Some(v) => v,
        };

        let token = bearer_token(value).ok_or_else(|| reject("bad_header"))?;
        let claims = self.codec.verify(token).map_err(|e| reject(e.reason()))?;
        let user_id = claims.user_id().map_err(|e| reject(e.reason()))?;

        match self.users.get(user_id).await {
            Ok(user) => Ok(Identity::from(user)),
            Err(StoreError::NotFound) => Err(reject("unknown_user")),
            Err(e) => Err(AppError::internal(e)),
        }
    }
}

/// Extract `<token>` from a header of exactly the form `Bearer <token>`.
fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

fn reject(reason: &'static str) -> AppError {
    tracing::debug!(reason, "Rejected authentication token");
    metrics::record_auth_failure(reason);
    AppError::InvalidAuthenticationToken
}

/// Middleware attaching the caller's [`Identity`] to the request.
pub async fn authenticate(
    State(auth): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut response = match auth.resolve(request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    response
        .headers_mut()
        .append(VARY, HeaderValue::from_static("Authorization"));
    response
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| AppError::Fault("identity requested before authentication ran".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use crate::config::AuthConfig;
    use crate::identity::{MemoryUserStore, NewUser, PasswordHash, Role};

    struct BrokenStore;

    #[async_trait::async_trait]
    impl UserStore for BrokenStore {
        async fn get(&self, _id: i64) -> Result<crate::identity::User, StoreError> {
            Err(StoreError::Backend("db-7 connection refused".into()))
        }
        async fn get_by_email(&self, _e: &str) -> Result<crate::identity::User, StoreError> {
            Err(StoreError::Backend("db-7 connection refused".into()))
        }
        async fn insert(&self, _u: NewUser) -> Result<crate::identity::User, StoreError> {
            Err(StoreError::Backend("db-7 connection refused".into()))
        }
        async fn list(&self, _r: Option<Role>) -> Result<Vec<crate::identity::User>, StoreError> {
            Err(StoreError::Backend("db-7 connection refused".into()))
        }
        async fn record_login(
            &self,
            _id: i64,
            _at: time::OffsetDateTime,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("db-7 connection refused".into()))
        }
    }

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(&AuthConfig {
            jwt_secret: "0123456789abcdef0123456789abcdef".into(),
            ..AuthConfig::default()
        }))
    }

    async fn whoami(identity: Identity) -> String {
        match identity.user() {
            Some(user) => format!("user:{}", user.id),
            None => "anonymous".into(),
        }
    }

    fn app(auth: Authenticator) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(axum::middleware::from_fn_with_state(auth, authenticate))
    }

    async fn seeded() -> (Arc<MemoryUserStore>, Arc<TokenCodec>, i64) {
        let store = Arc::new(MemoryUserStore::new());
        let user = store
            .insert(NewUser {
                full_name: "Alice".into(),
                email: "alice@example.com".into(),
                password: PasswordHash::from_stored("$2b$04$placeholder"),
                role: Role::Member,
                image: None,
            })
            .await
            .unwrap();
        (store, codec(), user.id)
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, Response) {
        let mut builder = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        (response.status(), response)
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let (store, codec, _) = seeded().await;
        let (status, response) = call(app(Authenticator::new(codec, store)), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[VARY], "Authorization");
        assert_eq!(text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let (store, codec, id) = seeded().await;
        let token = codec.issue(id).unwrap();
        let (status, response) = call(
            app(Authenticator::new(codec, store)),
            Some(&format!("Bearer {}", token)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(text(response).await, format!("user:{}", id));
    }

    #[tokio::test]
    async fn malformed_headers_are_invalid_token() {
        let (store, codec, id) = seeded().await;
        let token = codec.issue(id).unwrap();
        let auth = Authenticator::new(codec, store);

        for header in [
            "Bearer garbage".to_string(),
            format!("Token {}", token),
            format!("Bearer {} extra", token),
            format!("bearer {}", token),
            "Bearer".to_string(),
        ] {
            let (status, response) = call(app(auth.clone()), Some(&header)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "header {:?}", header);
            assert_eq!(response.headers()[VARY], "Authorization");
        }
    }

    #[tokio::test]
    async fn deleted_account_invalidates_token() {
        let (store, codec, id) = seeded().await;
        let token = codec.issue(id).unwrap();
        store.remove(id);

        let (status, _) = call(
            app(Authenticator::new(codec, store)),
            Some(&format!("Bearer {}", token)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn store_failure_is_internal_not_unauthorized() {
        let codec = codec();
        let token = codec.issue(5).unwrap();
        let (status, response) = call(
            app(Authenticator::new(codec, Arc::new(BrokenStore))),
            Some(&format!("Bearer {}", token)),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!text(response).await.contains("db-7"));
    }

    #[tokio::test]
    async fn identity_without_interceptor_is_a_fault() {
        let app = Router::new().route("/whoami", get(whoami));
        let (status, response) = call(app, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<crate::http::error::Fault>().is_some());
    }
}
