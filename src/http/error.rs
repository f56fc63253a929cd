//! Failure responses.
//!
//! Every stage and handler reports failures as [`AppError`]; this is the only
//! place that decides status codes and the `{"error": ...}` envelope.

use std::collections::BTreeMap;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Response extension marking an unexpected fault for the fault-isolation stage.
#[derive(Debug, Clone)]
pub struct Fault(pub String);

pub const INTERNAL_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("failed validation")]
    FailedValidation(BTreeMap<&'static str, &'static str>),
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,
    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),
    #[error("the server is at capacity, please retry later")]
    Overloaded,
    /// A dependency failed; detail is logged, never rendered.
    #[error("internal failure: {0}")]
    Internal(String),
    /// Something that should not happen did; the connection is closed afterwards.
    #[error("unexpected fault: {0}")]
    Fault(String),
}

impl AppError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        AppError::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::FailedValidation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::InvalidAuthenticationToken
            | AppError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AppError::NotPermitted => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) | AppError::Fault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The generic 500 body shared by internal failures and faults.
pub fn internal_body() -> Json<serde_json::Value> {
    Json(json!({ "error": INTERNAL_MESSAGE }))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        match self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal failure");
                (status, internal_body()).into_response()
            }
            AppError::Fault(detail) => {
                let mut response = (status, internal_body()).into_response();
                response.extensions_mut().insert(Fault(detail));
                response
            }
            AppError::FailedValidation(fields) => {
                (status, Json(json!({ "error": fields }))).into_response()
            }
            AppError::InvalidAuthenticationToken => {
                let mut response = (status, Json(json!({ "error": message }))).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            AppError::BadRequest(detail) => {
                (status, Json(json!({ "error": detail }))).into_response()
            }
            _ => (status, Json(json!({ "error": message }))).into_response(),
        }
    }
}
