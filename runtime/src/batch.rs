//! Batch submission.
//!
//! Rows go through the regular submission path one at a time, in order, so
//! earlier rows win seats over later ones exactly as separate calls would.
//! Nothing is transactional across rows: a failing row is reported and the
//! batch moves on.

use crate::engine::BookingEngine;
use crate::metrics::BatchMetrics;
use booking_core::{
    BatchOutcome, BatchRow, BatchRowResult, BookingError, OfferingId, RequestSurface, Result,
    RowError, SubmitRequest,
};

/// Runs batch submissions against one engine.
#[derive(Debug, Clone, Copy)]
pub struct BatchCoordinator<'a> {
    engine: &'a BookingEngine,
}

impl<'a> BatchCoordinator<'a> {
    /// Coordinator over `engine`.
    #[must_use]
    pub const fn new(engine: &'a BookingEngine) -> Self {
        Self { engine }
    }

    /// Submit every row against `offering`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::UnknownOffering`] for an unregistered offering
    /// and [`BookingError::Validation`] for an empty or oversized batch. No row
    /// is attempted in either case.
    #[tracing::instrument(skip(self, rows), fields(offering = %offering, rows = rows.len()))]
    pub async fn run(
        &self,
        offering: OfferingId,
        rows: Vec<BatchRow>,
        request_surface: RequestSurface,
    ) -> Result<BatchOutcome> {
        self.engine.offering_snapshot(offering)?;
        if rows.is_empty() {
            return Err(BookingError::validation("batch must contain at least one row"));
        }
        let limit = self.engine.config().max_batch_rows;
        if rows.len() > limit {
            return Err(BookingError::validation(format!(
                "batch of {} rows exceeds the limit of {limit}",
                rows.len()
            )));
        }

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let subject = row.subject;
            let request = SubmitRequest {
                offering,
                subject,
                choices: row.choices,
                idempotency_key: row.idempotency_key,
                request_surface: row.request_surface.unwrap_or(request_surface),
                payer: row.payer,
            };

            let result = match self.engine.submit(request).await {
                Ok(booking) => BatchRowResult {
                    ok: true,
                    subject: Some(subject),
                    error: None,
                    booking: Some(booking),
                },
                Err(err) => {
                    tracing::debug!(subject = %subject, error = %err, "Batch row failed");
                    BatchRowResult {
                        ok: false,
                        subject: Some(subject),
                        error: Some(RowError {
                            kind: err.kind(),
                            message: err.to_string(),
                            retryable: err.is_retryable(),
                        }),
                        booking: None,
                    }
                }
            };
            results.push(result);
        }

        let success_count = results.iter().filter(|row| row.ok).count();
        let failed_count = results.len() - success_count;
        BatchMetrics::record_rows(success_count, failed_count);
        tracing::info!(success_count, failed_count, "Batch processed");

        Ok(BatchOutcome {
            ok: failed_count == 0,
            success_count,
            failed_count,
            results,
        })
    }
}
