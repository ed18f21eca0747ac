//! Prometheus metrics for the booking engine.
//!
//! Engine code records through the small recorder types below; the server
//! binary installs the Prometheus recorder once and renders it at `/metrics`.
//! Without an installed recorder every call is a no-op.
//!
//! # Example
//!
//! ```rust,no_run
//! use booking_runtime::metrics::install_recorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = install_recorder()?;
//! println!("{}", handle.render());
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn builder() -> Result<PrometheusBuilder, MetricsError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )
        .map_err(|e| MetricsError::Build(e.to_string()))
}

/// Install the global Prometheus recorder and describe every booking metric.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = builder()?
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_metrics();
    Ok(handle)
}

/// Build a recorder without installing it globally.
///
/// Its handle renders an empty exposition; useful where `/metrics` must exist
/// but nothing should be recorded (tests, embedded use).
///
/// # Errors
///
/// Returns [`MetricsError::Build`] if the exporter cannot be configured.
pub fn detached_handle() -> Result<PrometheusHandle, MetricsError> {
    Ok(builder()?.build_recorder().handle())
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "booking_submissions_total",
        "Submissions by outcome (confirmed, pending, waitlisted, rejected, failed)"
    );
    describe_counter!(
        "booking_idempotent_replays_total",
        "Commands answered from the idempotency log"
    );
    describe_counter!("booking_cancellations_total", "Bookings cancelled");
    describe_counter!(
        "booking_promotions_total",
        "Waitlisted bookings offered a freed seat"
    );
    describe_counter!(
        "booking_offers_expired_total",
        "Offers that passed their deadline unconfirmed"
    );
    describe_counter!(
        "booking_payment_failures_total",
        "Payment gate failures by kind (declined, timeout, unavailable)"
    );
    describe_histogram!(
        "booking_payment_duration_seconds",
        "Time spent waiting on the payment gate"
    );
    describe_counter!(
        "booking_batch_rows_total",
        "Batch rows processed by outcome (ok, failed)"
    );
}

/// Submission and lifecycle counters.
pub struct BookingMetrics;

impl BookingMetrics {
    /// Record a finished submission.
    pub fn record_submission(outcome: &'static str) {
        counter!("booking_submissions_total", "outcome" => outcome).increment(1);
    }

    /// Record a cancellation.
    pub fn record_cancellation() {
        counter!("booking_cancellations_total").increment(1);
    }

    /// Record waitlist promotions.
    pub fn record_promotions(count: usize) {
        if count > 0 {
            counter!("booking_promotions_total").increment(count as u64);
        }
    }

    /// Record expired offers.
    pub fn record_expired(count: usize) {
        if count > 0 {
            counter!("booking_offers_expired_total").increment(count as u64);
        }
    }
}

/// Payment gate metrics recorder.
pub struct PaymentMetrics;

impl PaymentMetrics {
    /// Record one gate round trip.
    pub fn record_call(duration: Duration) {
        histogram!("booking_payment_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed charge.
    pub fn record_failure(kind: &'static str) {
        counter!("booking_payment_failures_total", "kind" => kind).increment(1);
    }
}

/// Batch metrics recorder.
pub struct BatchMetrics;

impl BatchMetrics {
    /// Record row outcomes of one batch.
    pub fn record_rows(ok: usize, failed: usize) {
        counter!("booking_batch_rows_total", "outcome" => "ok").increment(ok as u64);
        counter!("booking_batch_rows_total", "outcome" => "failed").increment(failed as u64);
    }
}
