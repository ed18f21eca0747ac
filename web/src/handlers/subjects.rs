//! Subject registration.
//!
//! - POST /api/subjects - register a subject

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use booking_core::Subject;
use serde::Deserialize;

/// Request to register a subject.
#[derive(Debug, Deserialize)]
pub struct RegisterSubjectRequest {
    /// Display name
    pub name: String,
}

/// Register a subject.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/subjects \
///   -H "Content-Type: application/json" \
///   -d '{"name": "Ada"}'
/// ```
///
/// # Errors
///
/// 422 for a malformed body or a blank name.
#[allow(clippy::unused_async)]
pub async fn register_subject(
    State(state): State<AppState>,
    payload: Result<Json<RegisterSubjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Subject>), AppError> {
    let Json(request) = payload?;
    let subject = state.engine.register_subject(request.name)?;
    Ok((StatusCode::CREATED, Json(subject)))
}
