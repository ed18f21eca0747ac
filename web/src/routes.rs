//! Router configuration.

use crate::handlers::{bookings, health::health_check, metrics::render_metrics, offerings, subjects};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

/// Build the complete router.
///
/// Health and metrics sit at the root; the booking API is nested under
/// `/api`. Every route runs inside the correlation-id middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/subjects", post(subjects::register_subject))
        .route("/offerings", post(offerings::register_offering))
        .route("/offerings/:id", get(offerings::get_offering))
        .route("/offerings/:id/capacity", put(offerings::resize_offering))
        .route("/offerings/:id/accepting", put(offerings::set_accepting))
        .route("/offerings/:id/batch", post(offerings::submit_batch))
        .route("/bookings", post(bookings::submit_booking))
        .route("/bookings/:id", get(bookings::get_booking))
        .route(
            "/bookings/:id/waitlist-position",
            get(bookings::waitlist_position),
        )
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/bookings/:id/confirm", post(bookings::confirm_offer))
        .route("/bookings/:id/decline", post(bookings::decline_offer));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .nest("/api", api_routes)
        .layer(correlation_id_layer())
        .with_state(state)
}
