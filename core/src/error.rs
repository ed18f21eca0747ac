//! Error taxonomy for booking operations.
//!
//! Every failure carries a stable [`ErrorKind`] so callers can tell terminal
//! failures (validation, declined payment) from retryable ones (payment gate
//! outage) without parsing messages.

use crate::types::{BookingId, BookingStatus, OfferingId, SubjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, BookingError>;

/// Errors produced by booking operations.
///
/// Capacity exhaustion is deliberately absent: a full offering routes the
/// request to the waitlist, which is a successful outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed request
    #[error("validation failed: {0}")]
    Validation(String),

    /// Offering is not registered
    #[error("offering {0} not found")]
    UnknownOffering(OfferingId),

    /// Subject is not registered
    #[error("subject {0} not found")]
    UnknownSubject(SubjectId),

    /// Booking does not exist
    #[error("booking {0} not found")]
    UnknownBooking(BookingId),

    /// Offering exists but does not accept new submissions
    #[error("offering {0} is not accepting bookings")]
    OfferingClosed(OfferingId),

    /// Subject already holds a live booking on the offering
    #[error("subject {subject} already holds booking {existing} on offering {offering}")]
    DuplicateSubmission {
        /// Subject that resubmitted
        subject: SubjectId,
        /// Offering targeted
        offering: OfferingId,
        /// The live booking
        existing: BookingId,
    },

    /// Confirmation arrived after the offer deadline
    #[error("offer for booking {0} has expired")]
    OfferExpired(BookingId),

    /// Operation not allowed from the booking's current status
    #[error("booking {booking} cannot be {action} while {status}")]
    InvalidTransition {
        /// Booking addressed
        booking: BookingId,
        /// Its current status
        status: BookingStatus,
        /// Attempted operation, past tense
        action: &'static str,
    },

    /// A payment for this booking is still in flight
    #[error("payment for booking {0} is still being settled")]
    SettlementInProgress(BookingId),

    /// Payment gate refused the charge
    #[error("payment declined for booking {booking}: {reason}")]
    PaymentDeclined {
        /// Booking charged
        booking: BookingId,
        /// Obligation reference from the gate, when it issued one
        reference: Option<String>,
        /// Gate's reason
        reason: String,
    },

    /// Payment gate did not answer (timeout, outage)
    #[error("payment gate unavailable for booking {booking}: {reason}")]
    PaymentUnavailable {
        /// Booking charged
        booking: BookingId,
        /// What went wrong
        reason: String,
    },

    /// Key reused with different request content
    #[error("idempotency key {key:?} was already used for a different {operation} request")]
    IdempotencyConflict {
        /// Operation the key belongs to
        operation: &'static str,
        /// The reused key
        key: String,
    },

    /// Ledger or queue invariant violated (programming error)
    #[error("booking invariant violated: {0}")]
    Invariant(String),

    /// Unexpected internal failure (poisoned lock, lost task)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable classification of [`BookingError`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed request or unknown reference
    Validation,
    /// Addressed booking does not exist
    NotFound,
    /// Subject already holds a live booking
    DuplicateSubmission,
    /// Offer deadline passed
    OfferExpired,
    /// Operation not valid in the current status
    InvalidState,
    /// Payment refused
    PaymentDeclined,
    /// Payment gate unreachable
    PaymentUnavailable,
    /// Key reused with different content
    IdempotencyConflict,
    /// Bug or infrastructure failure
    Internal,
}

impl ErrorKind {
    /// Snake-case name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::DuplicateSubmission => "duplicate_submission",
            Self::OfferExpired => "offer_expired",
            Self::InvalidState => "invalid_state",
            Self::PaymentDeclined => "payment_declined",
            Self::PaymentUnavailable => "payment_unavailable",
            Self::IdempotencyConflict => "idempotency_conflict",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BookingError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::UnknownOffering(_)
            | Self::UnknownSubject(_)
            | Self::OfferingClosed(_) => ErrorKind::Validation,
            Self::UnknownBooking(_) => ErrorKind::NotFound,
            Self::DuplicateSubmission { .. } => ErrorKind::DuplicateSubmission,
            Self::OfferExpired(_) => ErrorKind::OfferExpired,
            Self::InvalidTransition { .. } | Self::SettlementInProgress(_) => {
                ErrorKind::InvalidState
            }
            Self::PaymentDeclined { .. } => ErrorKind::PaymentDeclined,
            Self::PaymentUnavailable { .. } => ErrorKind::PaymentUnavailable,
            Self::IdempotencyConflict { .. } => ErrorKind::IdempotencyConflict,
            Self::Invariant(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the same request may succeed if retried later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PaymentUnavailable { .. })
    }

    /// Shorthand for [`BookingError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
