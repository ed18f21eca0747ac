//! Liveness endpoint for load balancers and monitoring.

use axum::http::StatusCode;

/// Returns 200 while the process is serving requests.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
