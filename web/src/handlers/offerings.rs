//! Offering endpoints.
//!
//! - POST /api/offerings - register an offering
//! - GET /api/offerings/:id - seat counts and queue length
//! - PUT /api/offerings/:id/capacity - resize
//! - PUT /api/offerings/:id/accepting - open or close for submissions
//! - POST /api/offerings/:id/batch - submit many bookings in order

use super::detached;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use booking_core::{BatchOutcome, BatchRow, OfferingId, OfferingSnapshot, OfferingSpec, RequestSurface};
use serde::Deserialize;
use uuid::Uuid;

/// Request to change capacity.
#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    /// New total seats
    pub capacity: u32,
}

/// Request to open or close an offering.
#[derive(Debug, Deserialize)]
pub struct AcceptingRequest {
    /// Whether new submissions are accepted
    pub accepting: bool,
}

/// Batch submission body.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    /// Rows, processed in order
    pub rows: Vec<BatchRow>,
    /// Surface applied to rows that do not name one
    #[serde(default)]
    pub request_surface: RequestSurface,
}

/// Register an offering.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/offerings \
///   -H "Content-Type: application/json" \
///   -d '{"name": "Robotics", "capacity": 12, "fee": 4500, "group": "Tuesday B"}'
/// ```
///
/// # Errors
///
/// 422 for a malformed body or a blank name.
#[allow(clippy::unused_async)]
pub async fn register_offering(
    State(state): State<AppState>,
    payload: Result<Json<OfferingSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<OfferingSnapshot>), AppError> {
    let Json(spec) = payload?;
    let snapshot = state.engine.register_offering(spec)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Current snapshot of an offering.
///
/// # Errors
///
/// 422 if the offering is not registered.
#[allow(clippy::unused_async)]
pub async fn get_offering(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<OfferingSnapshot>, AppError> {
    Ok(Json(state.engine.offering_snapshot(OfferingId::from_uuid(id))?))
}

/// Change an offering's capacity.
///
/// # Errors
///
/// 422 for an unknown offering or a capacity below the seats in use.
#[allow(clippy::unused_async)]
pub async fn resize_offering(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    payload: Result<Json<ResizeRequest>, JsonRejection>,
) -> Result<Json<OfferingSnapshot>, AppError> {
    let Json(request) = payload?;
    let snapshot = state
        .engine
        .resize_capacity(OfferingId::from_uuid(id), request.capacity)?;
    Ok(Json(snapshot))
}

/// Open or close an offering for new submissions.
///
/// # Errors
///
/// 422 for an unknown offering.
#[allow(clippy::unused_async)]
pub async fn set_accepting(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    payload: Result<Json<AcceptingRequest>, JsonRejection>,
) -> Result<Json<OfferingSnapshot>, AppError> {
    let Json(request) = payload?;
    let snapshot = state
        .engine
        .set_accepting(OfferingId::from_uuid(id), request.accepting)?;
    Ok(Json(snapshot))
}

/// Submit every row against the offering, in order.
///
/// Row failures are reported inside the outcome with a 200; only an invalid
/// batch as a whole fails the request.
///
/// # Errors
///
/// 422 for an unknown offering, an empty batch or too many rows.
pub async fn submit_batch(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchOutcome>, AppError> {
    let Json(request) = payload?;
    let engine = state.engine.clone();
    let outcome = detached(async move {
        engine
            .submit_batch(OfferingId::from_uuid(id), request.rows, request.request_surface)
            .await
    })
    .await?;

    tracing::info!(
        offering = %id,
        succeeded = outcome.success_count,
        failed = outcome.failed_count,
        "Batch processed"
    );
    Ok(Json(outcome))
}
