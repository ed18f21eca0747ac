//! Domain types for the activity booking engine.
//!
//! Value objects, the [`Booking`] entity with its status machine, and the
//! request/response shapes of the public commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an offering (a bookable activity instance)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferingId(Uuid);

impl OfferingId {
    /// Creates a new random `OfferingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OfferingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OfferingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OfferingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a subject (the student being enrolled)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(Uuid);

impl SubjectId {
    /// Creates a new random `SubjectId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SubjectId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// References
// ============================================================================

/// Kinds of record a [`Reference`] may point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// An [`Offering`]
    Offering,
    /// A [`Booking`]
    Booking,
    /// A [`Subject`]
    Subject,
}

/// Tagged pointer to a record owned by the engine.
///
/// Resolved by `BookingEngine::resolve` through the engine's own tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Which table to look in
    pub kind: ReferenceKind,
    /// Record identifier
    pub id: Uuid,
}

impl Reference {
    /// Reference to an offering
    #[must_use]
    pub const fn offering(id: OfferingId) -> Self {
        Self {
            kind: ReferenceKind::Offering,
            id: id.0,
        }
    }

    /// Reference to a booking
    #[must_use]
    pub const fn booking(id: BookingId) -> Self {
        Self {
            kind: ReferenceKind::Booking,
            id: id.0,
        }
    }

    /// Reference to a subject
    #[must_use]
    pub const fn subject(id: SubjectId) -> Self {
        Self {
            kind: ReferenceKind::Subject,
            id: id.0,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ReferenceKind::Offering => "offering",
            ReferenceKind::Booking => "booking",
            ReferenceKind::Subject => "subject",
        };
        write!(f, "{kind}:{}", self.id)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// No charge
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Subjects and Offerings
// ============================================================================

/// Where a request entered the system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSurface {
    /// Self-service portal used by families
    Portal,
    /// Staff desk / back office
    Staff,
    /// Direct API client
    #[default]
    Api,
    /// Bulk import or batch tooling
    Import,
}

/// A person who can be booked onto offerings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject identifier
    pub id: SubjectId,
    /// Display name
    pub name: String,
}

/// Registration payload for a new offering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingSpec {
    /// Display name
    pub name: String,
    /// Total seats
    pub capacity: u32,
    /// Fee charged on confirmation; zero means no payment step
    #[serde(default)]
    pub fee: Money,
    /// Group label reported on confirmed bookings
    #[serde(default)]
    pub group: Option<String>,
    /// Opaque organization/school scope key
    #[serde(default)]
    pub scope: Option<String>,
    /// Whether new submissions are accepted
    #[serde(default = "default_accepting")]
    pub accepting: bool,
}

const fn default_accepting() -> bool {
    true
}

impl OfferingSpec {
    /// A free, open offering with the given name and capacity.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            fee: Money::ZERO,
            group: None,
            scope: None,
            accepting: true,
        }
    }

    /// Set the fee.
    #[must_use]
    pub fn with_fee(mut self, fee: Money) -> Self {
        self.fee = fee;
        self
    }

    /// Set the group label.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Descriptive attributes of a registered offering.
///
/// Seat counts live in the offering's ledger, not here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    /// Offering identifier
    pub id: OfferingId,
    /// Display name
    pub name: String,
    /// Group label
    pub group: Option<String>,
    /// Fee charged on confirmation
    pub fee: Money,
    /// Opaque organization/school scope key
    pub scope: Option<String>,
    /// Whether new submissions are accepted
    pub accepting: bool,
}

impl Offering {
    /// Build an offering from its registration payload.
    #[must_use]
    pub fn from_spec(id: OfferingId, spec: &OfferingSpec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            group: spec.group.clone(),
            fee: spec.fee,
            scope: spec.scope.clone(),
            accepting: spec.accepting,
        }
    }

    /// Whether confirmation goes through the payment gate.
    #[must_use]
    pub const fn payment_required(&self) -> bool {
        !self.fee.is_zero()
    }
}

/// Seat accounting for one offering at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Total seats
    pub capacity: u32,
    /// Seats held by confirmed bookings
    pub confirmed: u32,
    /// Seats held by open offers and pending payments
    pub held: u32,
}

impl LedgerSnapshot {
    /// Seats neither confirmed nor held.
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.confirmed + self.held)
    }
}

/// Read model for an offering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingSnapshot {
    /// Offering identifier
    pub id: OfferingId,
    /// Display name
    pub name: String,
    /// Group label
    pub group: Option<String>,
    /// Fee
    pub fee: Money,
    /// Whether new submissions are accepted
    pub accepting: bool,
    /// Total seats
    pub capacity: u32,
    /// Confirmed seats
    pub confirmed: u32,
    /// Held seats
    pub held: u32,
    /// Free seats
    pub available: u32,
    /// Bookings currently waiting
    pub waitlist_length: usize,
    /// Offers currently outstanding
    pub open_offers: usize,
}

// ============================================================================
// Bookings
// ============================================================================

/// Booking status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Seat reserved, payment outstanding
    Pending,
    /// Seat confirmed
    Confirmed,
    /// Waiting in the offering's queue
    Waitlisted,
    /// Seat offered, awaiting confirmation before the deadline
    Offered,
    /// Payment failed after a seat was reserved (terminal)
    Rejected,
    /// Withdrawn by the caller (terminal)
    Cancelled,
}

impl BookingStatus {
    /// Terminal statuses never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }

    /// Statuses that occupy a seat in the ledger.
    #[must_use]
    pub const fn holds_seat(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Offered)
    }

    /// Statuses a caller may cancel from.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Confirmed | Self::Waitlisted | Self::Offered)
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Waitlisted => "Waitlisted",
            Self::Offered => "Seat offered",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Waitlisted => "waitlisted",
            Self::Offered => "offered",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Progress of the payment obligation attached to a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Free offering
    NotRequired,
    /// Charge requested or not yet attempted
    Pending,
    /// Charge succeeded
    Settled,
    /// Last charge attempt failed
    Declined,
}

/// One entry in a booking's audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Previous status (`None` on creation)
    pub from: Option<BookingStatus>,
    /// New status
    pub to: BookingStatus,
    /// When the change happened
    pub at: DateTime<Utc>,
}

/// One subject's request against one offering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// Offering booked
    pub offering: OfferingId,
    /// Subject booked
    pub subject: SubjectId,
    /// Current status
    pub status: BookingStatus,
    /// Ranked alternative offerings
    pub choices: Vec<OfferingId>,
    /// Per-offering arrival sequence (refreshed when re-queued)
    pub sequence: u64,
    /// Whether confirmation requires payment
    pub payment_required: bool,
    /// Amount charged on confirmation
    pub amount: Money,
    /// Opaque payer reference
    pub payer: Option<String>,
    /// Payment state
    pub payment_state: PaymentState,
    /// Reference returned by the payment gate
    pub payment_reference: Option<String>,
    /// Deadline of the outstanding offer
    pub offer_expires_at: Option<DateTime<Utc>>,
    /// Where the request came from
    pub request_surface: RequestSurface,
    /// Key the booking was created under
    pub idempotency_key: String,
    /// Reason given on cancellation
    pub cancellation_reason: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Audit trail
    pub history: Vec<StatusChange>,
}

impl Booking {
    /// Create a booking in `status` at `now`.
    #[must_use]
    pub fn new(
        id: BookingId,
        offering: &Offering,
        request: &SubmitRequest,
        sequence: u64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let payment_required = offering.payment_required();
        Self {
            id,
            offering: offering.id,
            subject: request.subject,
            status,
            choices: request.choices.clone(),
            sequence,
            payment_required,
            amount: offering.fee,
            payer: request.payer.clone(),
            payment_state: if payment_required {
                PaymentState::Pending
            } else {
                PaymentState::NotRequired
            },
            payment_reference: None,
            offer_expires_at: None,
            request_surface: request.request_surface,
            idempotency_key: request.idempotency_key.clone(),
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            history: vec![StatusChange {
                from: None,
                to: status,
                at: now,
            }],
        }
    }

    /// Move to `to`, recording the change in the audit trail.
    ///
    /// Leaving `Offered` clears the offer deadline.
    pub fn transition(&mut self, to: BookingStatus, at: DateTime<Utc>) {
        if self.status == BookingStatus::Offered && to != BookingStatus::Offered {
            self.offer_expires_at = None;
        }
        self.history.push(StatusChange {
            from: Some(self.status),
            to,
            at,
        });
        self.status = to;
        self.updated_at = at;
    }

    /// Label shown to callers; waitlisted bookings include their position.
    #[must_use]
    pub fn status_label(&self, waitlist_position: Option<usize>) -> String {
        match (self.status, waitlist_position) {
            (BookingStatus::Pending, _) if self.payment_state == PaymentState::Pending => {
                "Awaiting payment".to_string()
            }
            (BookingStatus::Waitlisted, Some(position)) => format!("Waitlisted (#{position})"),
            (status, _) => status.label().to_string(),
        }
    }
}

/// Response shape of every booking command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingResult {
    /// Booking identifier
    pub booking_id: BookingId,
    /// Offering booked
    pub offering: OfferingId,
    /// Subject booked
    pub subject: SubjectId,
    /// Final status
    pub status: BookingStatus,
    /// Human-readable status
    pub status_label: String,
    /// Group label of the offering, once confirmed
    pub allocated_group: Option<String>,
    /// 1-indexed distance from the queue head, while waitlisted
    pub waitlist_position: Option<usize>,
    /// Offer deadline, while offered
    pub offer_expiry: Option<DateTime<Utc>>,
    /// Whether confirmation requires payment
    pub payment_required: bool,
    /// Amount charged on confirmation
    pub amount: Money,
    /// Opaque payer reference
    pub payer: Option<String>,
    /// Reference returned by the payment gate
    pub payment_reference: Option<String>,
    /// Ranked alternative offerings
    pub choices: Vec<OfferingId>,
}

impl BookingResult {
    /// Project a booking into its response shape.
    #[must_use]
    pub fn from_booking(
        booking: &Booking,
        waitlist_position: Option<usize>,
        group: Option<&str>,
    ) -> Self {
        let waitlist_position = waitlist_position.filter(|_| booking.status == BookingStatus::Waitlisted);
        Self {
            booking_id: booking.id,
            offering: booking.offering,
            subject: booking.subject,
            status: booking.status,
            status_label: booking.status_label(waitlist_position),
            allocated_group: group
                .filter(|_| booking.status == BookingStatus::Confirmed)
                .map(str::to_string),
            waitlist_position,
            offer_expiry: booking.offer_expires_at,
            payment_required: booking.payment_required,
            amount: booking.amount,
            payer: booking.payer.clone(),
            payment_reference: booking.payment_reference.clone(),
            choices: booking.choices.clone(),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Request to book `subject` onto `offering`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Offering to book
    pub offering: OfferingId,
    /// Subject to book
    pub subject: SubjectId,
    /// Ranked alternative offerings
    #[serde(default)]
    pub choices: Vec<OfferingId>,
    /// Caller-supplied deduplication key
    pub idempotency_key: String,
    /// Where the request came from
    #[serde(default)]
    pub request_surface: RequestSurface,
    /// Opaque payer reference
    #[serde(default)]
    pub payer: Option<String>,
}

impl SubmitRequest {
    /// Minimal request with no choices and no payer.
    #[must_use]
    pub fn new(offering: OfferingId, subject: SubjectId, idempotency_key: impl Into<String>) -> Self {
        Self {
            offering,
            subject,
            choices: Vec::new(),
            idempotency_key: idempotency_key.into(),
            request_surface: RequestSurface::default(),
            payer: None,
        }
    }

    /// Canonical form of the request content, excluding the key itself.
    ///
    /// Two requests under one key must share a fingerprint. An absent payer
    /// and an empty one are different content.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        serde_json::json!({
            "offering": self.offering,
            "subject": self.subject,
            "choices": self.choices,
            "request_surface": self.request_surface,
            "payer": self.payer,
        })
        .to_string()
    }
}

/// Result of a cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    /// Always true for a successful cancellation
    pub ok: bool,
    /// The cancelled booking
    pub booking: BookingResult,
    /// The waitlisted booking that received the freed seat, if any
    pub promoted_waitlist_booking: Option<BookingResult>,
}

/// Queue position of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistPosition {
    /// Booking identifier
    pub booking_id: BookingId,
    /// 1-indexed position, `None` when not waitlisted
    pub position: Option<usize>,
    /// Bookings currently waiting on the offering
    pub queue_length: usize,
}

/// One row of a batch submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRow {
    /// Subject to book
    pub subject: SubjectId,
    /// Ranked alternative offerings
    #[serde(default)]
    pub choices: Vec<OfferingId>,
    /// Caller-supplied deduplication key for this row
    pub idempotency_key: String,
    /// Row-level surface, defaulting to the batch's
    #[serde(default)]
    pub request_surface: Option<RequestSurface>,
    /// Opaque payer reference
    #[serde(default)]
    pub payer: Option<String>,
}

/// Structured error attached to a failed batch row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Stable error kind
    pub kind: crate::error::ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Whether retrying the row may succeed
    pub retryable: bool,
}

/// Outcome of one batch row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRowResult {
    /// Whether the row produced a booking
    pub ok: bool,
    /// Subject of the row
    pub subject: Option<SubjectId>,
    /// Error for failed rows
    pub error: Option<RowError>,
    /// Booking for successful rows
    pub booking: Option<BookingResult>,
}

/// Aggregate outcome of a batch submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// True when no row failed
    pub ok: bool,
    /// Rows that produced a booking
    pub success_count: usize,
    /// Rows that failed
    pub failed_count: usize,
    /// Per-row results in submission order
    pub results: Vec<BatchRowResult>,
}

/// A [`Reference`] resolved against the engine's tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolved {
    /// Offering snapshot
    Offering(OfferingSnapshot),
    /// Booking result
    Booking(BookingResult),
    /// Subject record
    Subject(Subject),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_booking(status: BookingStatus) -> Booking {
        let offering = Offering::from_spec(
            OfferingId::new(),
            &OfferingSpec::new("Robotics", 10).with_group("Tuesday B"),
        );
        let request = SubmitRequest::new(offering.id, SubjectId::new(), "key-0001");
        Booking::new(BookingId::new(), &offering, &request, 1, status, Utc::now())
    }

    #[test]
    fn money_display_uses_two_decimals() {
        assert_eq!(Money::from_cents(1_250).to_string(), "12.50");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
        assert!(Money::ZERO.is_zero());
    }

    #[test]
    fn status_classification() {
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Rejected.is_terminal());
        assert!(!BookingStatus::Offered.is_terminal());
        assert!(BookingStatus::Pending.holds_seat());
        assert!(!BookingStatus::Waitlisted.holds_seat());
        assert!(!BookingStatus::Pending.is_cancellable());
    }

    #[test]
    fn transition_records_history_and_clears_offer_deadline() {
        let mut booking = fixture_booking(BookingStatus::Waitlisted);
        let now = Utc::now();
        booking.offer_expires_at = Some(now);
        booking.transition(BookingStatus::Offered, now);
        assert_eq!(booking.offer_expires_at, Some(now));

        booking.transition(BookingStatus::Confirmed, now);
        assert_eq!(booking.offer_expires_at, None);
        assert_eq!(booking.history.len(), 3);
        assert_eq!(booking.history[2].from, Some(BookingStatus::Offered));
    }

    #[test]
    fn result_reports_group_only_when_confirmed() {
        let confirmed = fixture_booking(BookingStatus::Confirmed);
        let result = BookingResult::from_booking(&confirmed, None, Some("Tuesday B"));
        assert_eq!(result.allocated_group.as_deref(), Some("Tuesday B"));

        let waiting = fixture_booking(BookingStatus::Waitlisted);
        let result = BookingResult::from_booking(&waiting, Some(3), Some("Tuesday B"));
        assert_eq!(result.allocated_group, None);
        assert_eq!(result.waitlist_position, Some(3));
        assert_eq!(result.status_label, "Waitlisted (#3)");
    }

    #[test]
    fn fingerprint_ignores_key_but_not_content() {
        let offering = OfferingId::new();
        let subject = SubjectId::new();
        let a = SubmitRequest::new(offering, subject, "key-a");
        let b = SubmitRequest::new(offering, subject, "key-b");
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut c = a.clone();
        c.payer = Some("guardian-1".to_string());
        assert_ne!(a.fingerprint(), c.fingerprint());

        let mut empty = a.clone();
        empty.payer = Some(String::new());
        assert_ne!(a.fingerprint(), empty.fingerprint());
    }

    #[test]
    fn reference_display() {
        let id = BookingId::new();
        assert_eq!(Reference::booking(id).to_string(), format!("booking:{id}"));
    }
}
