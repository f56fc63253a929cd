//! Authorization guards.
//!
//! Mounted per route with `route_layer`, always inside the authentication
//! interceptor. The role guard runs the authentication check first, so an
//! anonymous caller gets 401 from it, never 403.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::error::AppError;
use crate::identity::{Identity, Role, User};

/// The caller's user record, or 401 for anonymous callers.
pub fn ensure_authenticated(identity: &Identity) -> Result<&User, AppError> {
    identity.user().ok_or(AppError::AuthenticationRequired)
}

/// The caller's user record if it holds exactly `role`.
pub fn ensure_role(identity: &Identity, role: Role) -> Result<&User, AppError> {
    let user = ensure_authenticated(identity)?;
    if identity.role() != Some(role) {
        tracing::debug!(user_id = user.id, has = %user.role, wants = %role, "Role check failed");
        return Err(AppError::NotPermitted);
    }
    Ok(user)
}

pub async fn require_authenticated(
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    ensure_authenticated(&identity)?;
    Ok(next.run(request).await)
}

/// Use with `middleware::from_fn_with_state(Role::Admin, require_role)`.
pub async fn require_role(
    State(role): State<Role>,
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    ensure_role(&identity, role)?;
    Ok(next.run(request).await)
}
