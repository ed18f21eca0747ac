//! Payment gate collaborator.
//!
//! The engine never prices or invoices anything itself. When an offering
//! carries a fee, confirmation is deferred until the [`PaymentGate`] reports a
//! successful charge. The gate is called outside every engine lock, so a slow
//! gate never blocks other callers on the same offering.

use crate::types::{BookingId, Money, OfferingId, SubjectId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Payment gate result
pub type GatewayResult<T> = Result<T, PaymentGateError>;

/// Payment gate error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentGateError {
    /// The charge was refused
    #[error("payment declined: {reason}")]
    Declined {
        /// Obligation reference, if the gate created one before declining
        reference: Option<String>,
        /// Decline reason
        reason: String,
    },
    /// The gate did not answer in time
    #[error("payment gate timeout")]
    Timeout,
    /// The gate is unreachable or failed internally
    #[error("payment gate unavailable: {reason}")]
    Unavailable {
        /// Failure detail
        reason: String,
    },
}

/// A charge the engine asks the gate to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Booking being confirmed
    pub booking: BookingId,
    /// Offering booked
    pub offering: OfferingId,
    /// Subject booked
    pub subject: SubjectId,
    /// Opaque payer reference
    pub payer: Option<String>,
    /// Amount to charge
    pub amount: Money,
    /// Stable key the gate can deduplicate on (one per booking and attempt)
    pub idempotency_key: String,
}

/// Successful charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// Obligation reference issued by the gate
    pub reference: String,
    /// Amount charged
    pub amount: Money,
}

/// Payment gate trait
///
/// Abstraction over whatever settles booking fees (payment processor, invoice
/// ledger, school billing system).
pub trait PaymentGate: Send + Sync {
    /// Charge the booking's fee and report the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentGateError::Declined`] when the charge is refused and
    /// [`PaymentGateError::Timeout`] / [`PaymentGateError::Unavailable`] when
    /// the outcome is unknown.
    fn charge(
        &self,
        request: PaymentRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentReceipt>> + Send + '_>>;
}

/// Development gate that approves every charge.
///
/// Stands in for a real billing integration in local deployments.
#[derive(Debug, Default)]
pub struct ApprovingPaymentGate {
    issued: AtomicU64,
}

impl ApprovingPaymentGate {
    /// Creates a new approving gate
    #[must_use]
    pub const fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
        }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentGate> {
        Arc::new(Self::new())
    }
}

impl PaymentGate for ApprovingPaymentGate {
    fn charge(
        &self,
        request: PaymentRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentReceipt>> + Send + '_>> {
        Box::pin(async move {
            let sequence = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
            let reference = format!("obl-{sequence:06}");

            tracing::info!(
                booking = %request.booking,
                amount = request.amount.cents(),
                reference = %reference,
                "Payment approved"
            );

            Ok(PaymentReceipt {
                reference,
                amount: request.amount,
            })
        })
    }
}
