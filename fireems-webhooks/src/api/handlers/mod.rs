//! Axum route handlers.

pub mod webhooks;

use axum::http::StatusCode;

/// Liveness probe.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
