//! Route handlers.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::auth::ensure_authenticated;
use crate::http::error::AppError;
use crate::http::server::AppState;
use crate::identity::password::MAX_PASSWORD_LEN;
use crate::identity::{Identity, Role, StoreError};

const MIN_PASSWORD_LEN: usize = 8;

pub async fn healthcheck(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.config.environment.as_str(),
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

impl TokenRequest {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = BTreeMap::new();

        if self.email.is_empty() {
            errors.insert("email", "must be provided");
        } else if !looks_like_email(&self.email) {
            errors.insert("email", "must be a valid email address");
        }

        if self.password.is_empty() {
            errors.insert("password", "must be provided");
        } else if self.password.len() < MIN_PASSWORD_LEN {
            errors.insert("password", "must be at least 8 bytes long");
        } else if self.password.len() > MAX_PASSWORD_LEN {
            errors.insert("password", "must not be more than 72 bytes long");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::FailedValidation(errors))
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// `POST /v1/tokens/authentication`: exchange email and password for a token.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    input.validate()?;

    let user = match state.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(AppError::InvalidCredentials),
        Err(e) => return Err(AppError::internal(e)),
    };

    // bcrypt blocks for tens of milliseconds.
    let hash = user.password.clone();
    let matched = tokio::task::spawn_blocking(move || hash.matches(&input.password))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)?;
    if !matched {
        return Err(AppError::InvalidCredentials);
    }

    let token = state.codec.issue(user.id).map_err(AppError::internal)?;

    let users = state.users.clone();
    let user_id = user.id;
    state.tasks.spawn("record_login", async move {
        if let Err(e) = users.record_login(user_id, OffsetDateTime::now_utc()).await {
            tracing::warn!(user_id, error = %e, "Failed to record login");
        }
    });

    tracing::info!(user_id, "Authentication token issued");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}

/// `GET /v1/pools`
pub async fn list_pools(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let pools = state.catalog.pools().await.map_err(AppError::internal)?;
    Ok(Json(json!({ "pools": pools })))
}

/// `GET /v1/groups`
pub async fn list_groups(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let groups = state.catalog.groups().await.map_err(AppError::internal)?;
    Ok(Json(json!({ "groups": groups })))
}

/// `GET /v1/subscriptions`
pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let subscriptions = state.catalog.subscriptions().await.map_err(AppError::internal)?;
    Ok(Json(json!({ "subscriptions": subscriptions })))
}

/// `GET /v1/users/me`
pub async fn show_current_user(identity: Identity) -> Result<Json<Value>, AppError> {
    let user = ensure_authenticated(&identity)?;
    Ok(Json(json!({ "user": user })))
}

/// `GET /v1/trainers`
pub async fn list_trainers(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let trainers = state
        .users
        .list(Some(Role::Trainer))
        .await
        .map_err(AppError::internal)?;
    Ok(Json(json!({ "trainers": trainers })))
}

/// `GET /v1/admin/users`
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let users = state.users.list(None).await.map_err(AppError::internal)?;
    Ok(Json(json!({ "users": users })))
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}

pub async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method)
}
