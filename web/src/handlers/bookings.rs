//! Booking endpoints.
//!
//! - POST /api/bookings - submit a booking
//! - GET /api/bookings/:id - current result
//! - GET /api/bookings/:id/waitlist-position - queue position
//! - POST /api/bookings/:id/cancel - cancel
//! - POST /api/bookings/:id/confirm - accept an offer
//! - POST /api/bookings/:id/decline - turn down an offer
//!
//! The engine settles submissions and confirmations on its own task, so a
//! client that disconnects mid-charge never leaves a seat held.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use booking_core::{BookingId, BookingResult, CancelOutcome, SubmitRequest, WaitlistPosition};
use serde::Deserialize;
use uuid::Uuid;

/// Optional cancellation body.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    /// Free-text reason kept on the booking
    #[serde(default)]
    pub reason: Option<String>,
}

/// Submit a booking.
///
/// Retrying with the same `idempotency_key` returns the first result.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings \
///   -H "Content-Type: application/json" \
///   -d '{"offering": "<uuid>", "subject": "<uuid>", "idempotency_key": "enrol-ada-1"}'
/// ```
///
/// # Errors
///
/// Any [`booking_core::BookingError`], mapped by kind.
pub async fn submit_booking(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<BookingResult>, AppError> {
    let Json(request) = payload?;
    let result = state.engine.submit(request).await?;
    Ok(Json(result))
}

/// Current result view of a booking.
///
/// # Errors
///
/// 404 for an unknown booking.
#[allow(clippy::unused_async)]
pub async fn get_booking(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<BookingResult>, AppError> {
    Ok(Json(state.engine.booking(BookingId::from_uuid(id))?))
}

/// Waitlist position of a booking.
///
/// # Errors
///
/// 404 for an unknown booking.
#[allow(clippy::unused_async)]
pub async fn waitlist_position(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WaitlistPosition>, AppError> {
    Ok(Json(state.engine.waitlist_position(BookingId::from_uuid(id))?))
}

/// Cancel a booking. The body is optional.
///
/// # Errors
///
/// 404 for an unknown booking, 409 from `Pending` or `Rejected` or while a
/// confirmation charge is in flight.
pub async fn cancel_booking(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<CancelOutcome>, AppError> {
    let reason = payload.map(|Json(body)| body).unwrap_or_default().reason;
    let outcome = state.engine.cancel(BookingId::from_uuid(id), reason).await?;
    Ok(Json(outcome))
}

/// Accept an outstanding offer.
///
/// # Errors
///
/// 410 once the offer has expired, 409 if there is no offer, 402 or 503 if
/// the charge fails.
pub async fn confirm_offer(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<BookingResult>, AppError> {
    let result = state.engine.confirm_offer(BookingId::from_uuid(id)).await?;
    Ok(Json(result))
}

/// Turn down an outstanding offer.
///
/// # Errors
///
/// 409 unless the booking holds an open offer.
#[allow(clippy::unused_async)]
pub async fn decline_offer(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<BookingResult>, AppError> {
    Ok(Json(state.engine.decline_offer(BookingId::from_uuid(id))?))
}
