//! Application state for Axum handlers.

use booking_runtime::BookingEngine;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// State shared by every handler. Cloned per request; all fields are cheap
/// handles.
#[derive(Clone)]
pub struct AppState {
    /// The booking engine
    pub engine: Arc<BookingEngine>,
    /// Prometheus handle rendered at `GET /metrics`, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State without a metrics endpoint.
    #[must_use]
    pub const fn new(engine: Arc<BookingEngine>) -> Self {
        Self {
            engine,
            metrics: None,
        }
    }

    /// Expose `handle` at `GET /metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
