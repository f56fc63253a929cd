//! Fault isolation.
//!
//! The outermost pipeline stage. Panics are caught by
//! [`tower_http::catch_panic`] and turned into [`AppError::Fault`]; any
//! response carrying the resulting [`Fault`] marker is replaced here by the
//! generic 500 and the connection is marked for closing.

use std::any::Any;

use axum::extract::Request;
use axum::http::header::CONNECTION;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::error::{internal_body, AppError, Fault};
use crate::http::request::request_id;
use crate::observability::metrics;

/// Response builder for `CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "non-string panic payload".to_string()
    };
    AppError::Fault(format!("panic: {}", detail)).into_response()
}

pub async fn isolate_faults(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(&request).to_string();

    let mut response = next.run(request).await;
    let Some(Fault(detail)) = response.extensions_mut().remove::<Fault>() else {
        return response;
    };

    tracing::error!(
        request_id = %request_id,
        method = %method,
        path = %path,
        error = %detail,
        "Unexpected fault, closing connection"
    );
    metrics::record_fault();

    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, internal_body()).into_response();
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));
    response
}
