//! The booking engine.
//!
//! Holds every offering in an arena of independently locked slots. All ledger,
//! waitlist, offer and booking mutations for one offering happen under that
//! offering's lock; different offerings proceed in parallel. Locks are only
//! taken inside synchronous helpers, so no guard ever lives across an
//! `.await`. Payment gate calls run between two locked phases: the seat is
//! recorded as held before the call and committed or released after it.
//!
//! Commands that may charge run on their own task: a caller that stops
//! waiting does not stop the charge, the settlement or the idempotency
//! record, and every gate call is bounded by the configured payment timeout.
//!
//! Lock order is offering slot, then booking index. The offering table and the
//! subject directory are only read briefly and never held while a slot is
//! being locked.

use crate::batch::BatchCoordinator;
use crate::config::EngineConfig;
use crate::idempotency::CommandLog;
use crate::ledger::{CapacityLedger, LedgerError, Reservation};
use crate::metrics::{BookingMetrics, PaymentMetrics};
use crate::offers::{OfferBook, OfferState};
use crate::waitlist::WaitlistQueue;
use booking_core::payment::GatewayResult;
use booking_core::{
    BatchOutcome, BatchRow, Booking, BookingError, BookingId, BookingResult, BookingStatus,
    CancelOutcome, Clock, Offering, OfferingId, OfferingSnapshot, OfferingSpec, PaymentGate,
    PaymentGateError, PaymentReceipt, PaymentRequest, PaymentState, Reference, ReferenceKind,
    RequestSurface, Resolved, Result, Subject, SubjectId, SubmitRequest, WaitlistPosition,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;
use tracing::Instrument;

/// Longest accepted idempotency key, in characters.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

impl From<LedgerError> for BookingError {
    fn from(err: LedgerError) -> Self {
        Self::Invariant(err.to_string())
    }
}

/// Result of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Offers expired and re-queued
    pub expired: usize,
    /// Waitlisted bookings offered a freed seat
    pub promoted: usize,
    /// Offerings that could not be swept
    pub failed: usize,
}

/// Everything the engine knows about one offering.
struct OfferingState {
    offering: Offering,
    ledger: CapacityLedger,
    waitlist: WaitlistQueue,
    offers: OfferBook,
    bookings: HashMap<BookingId, Booking>,
    /// Non-terminal booking per subject
    active_by_subject: HashMap<SubjectId, BookingId>,
    next_sequence: u64,
}

impl OfferingState {
    fn new(offering: Offering, capacity: u32) -> Self {
        Self {
            offering,
            ledger: CapacityLedger::new(capacity),
            waitlist: WaitlistQueue::new(),
            offers: OfferBook::new(),
            bookings: HashMap::new(),
            active_by_subject: HashMap::new(),
            next_sequence: 0,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn booking(&self, id: BookingId) -> Result<&Booking> {
        self.bookings.get(&id).ok_or(BookingError::UnknownBooking(id))
    }

    fn booking_mut(&mut self, id: BookingId) -> Result<&mut Booking> {
        self.bookings
            .get_mut(&id)
            .ok_or(BookingError::UnknownBooking(id))
    }

    fn result(&self, id: BookingId) -> Result<BookingResult> {
        let booking = self.booking(id)?;
        Ok(BookingResult::from_booking(
            booking,
            self.waitlist.position_of(id),
            self.offering.group.as_deref(),
        ))
    }

    fn snapshot(&self) -> OfferingSnapshot {
        let ledger = self.ledger.snapshot();
        OfferingSnapshot {
            id: self.offering.id,
            name: self.offering.name.clone(),
            group: self.offering.group.clone(),
            fee: self.offering.fee,
            accepting: self.offering.accepting,
            capacity: ledger.capacity,
            confirmed: ledger.confirmed,
            held: ledger.held,
            available: ledger.available(),
            waitlist_length: self.waitlist.len(),
            open_offers: self.offers.len(),
        }
    }

    fn release_subject(&mut self, subject: SubjectId, booking: BookingId) {
        if self.active_by_subject.get(&subject) == Some(&booking) {
            self.active_by_subject.remove(&subject);
        }
    }

    /// Put `id` back at the tail with a fresh sequence.
    fn requeue(&mut self, id: BookingId, now: DateTime<Utc>) -> Result<usize> {
        let sequence = self.next_sequence();
        let booking = self.booking_mut(id)?;
        booking.sequence = sequence;
        booking.transition(BookingStatus::Waitlisted, now);
        Ok(self.waitlist.enqueue(id, sequence))
    }

    /// Withdraw the offer for `id`, return its seat and re-queue the booking.
    ///
    /// Shared by the sweep, late confirmations and declines.
    fn expire_offer(&mut self, id: BookingId, now: DateTime<Utc>) -> Result<usize> {
        self.booking(id)?;
        if self.offers.get(id).is_none() {
            return Err(BookingError::Invariant(format!(
                "booking {id} has no offer to withdraw"
            )));
        }
        self.ledger.release_held()?;
        self.offers.take(id);
        self.requeue(id, now)
    }

    /// Offer free seats to the queue head until either runs out.
    fn promote(&mut self, now: DateTime<Utc>, ttl: chrono::Duration) -> Result<Vec<BookingId>> {
        let mut promoted = Vec::new();
        while self.ledger.available() > 0 {
            let Some(head) = self.waitlist.head().copied() else {
                break;
            };
            if !self.bookings.contains_key(&head.booking) {
                return Err(BookingError::Invariant(format!(
                    "waitlisted booking {} is missing",
                    head.booking
                )));
            }
            if self.ledger.reserve() == Reservation::Full {
                break;
            }
            self.waitlist.dequeue_head();

            let expires_at = now + ttl;
            self.offers.extend(head.booking, expires_at);
            let booking = self.booking_mut(head.booking)?;
            booking.transition(BookingStatus::Offered, now);
            booking.offer_expires_at = Some(expires_at);

            tracing::info!(
                offering = %self.offering.id,
                booking = %head.booking,
                expires_at = %expires_at,
                "Seat offered to waitlisted booking"
            );
            promoted.push(head.booking);
        }
        Ok(promoted)
    }
}

/// Outcome of the locked admission phase of a submission.
enum Admission {
    Placed(BookingResult),
    AwaitingPayment(PaymentRequest),
}

/// Outcome of the locked first phase of a confirmation.
enum Confirmation {
    Done(BookingResult),
    Charge(PaymentRequest),
}

fn lock_state(slot: &Mutex<OfferingState>) -> Result<MutexGuard<'_, OfferingState>> {
    slot.lock()
        .map_err(|e| BookingError::Internal(format!("offering lock poisoned: {e}")))
}

fn poisoned(what: &str, err: impl fmt::Display) -> BookingError {
    BookingError::Internal(format!("{what} lock poisoned: {err}"))
}

/// Run `command` on its own task and wait for it.
///
/// Dropping the returned future leaves the task running to completion.
async fn detached<T, F>(command: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(command.in_current_span())
        .await
        .map_err(|e| BookingError::Internal(format!("booking task failed: {e}")))?
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(BookingError::validation("idempotency key must not be empty"));
    }
    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(BookingError::validation(format!(
            "idempotency key exceeds {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    Ok(())
}

fn payment_error(booking: BookingId, err: PaymentGateError) -> BookingError {
    match err {
        PaymentGateError::Declined { reference, reason } => BookingError::PaymentDeclined {
            booking,
            reference,
            reason,
        },
        PaymentGateError::Timeout => BookingError::PaymentUnavailable {
            booking,
            reason: "payment gate timeout".to_string(),
        },
        PaymentGateError::Unavailable { reason } => {
            BookingError::PaymentUnavailable { booking, reason }
        }
    }
}

const fn failure_kind(err: &PaymentGateError) -> &'static str {
    match err {
        PaymentGateError::Declined { .. } => "declined",
        PaymentGateError::Timeout => "timeout",
        PaymentGateError::Unavailable { .. } => "unavailable",
    }
}

/// Record the failed charge on the booking itself.
fn mark_declined(booking: &mut Booking, err: &PaymentGateError) {
    booking.payment_state = PaymentState::Declined;
    if let PaymentGateError::Declined {
        reference: Some(reference),
        ..
    } = err
    {
        booking.payment_reference = Some(reference.clone());
    }
}

/// Capacity-limited booking allocation engine.
///
/// # Example
///
/// ```rust,no_run
/// use booking_core::{ApprovingPaymentGate, OfferingSpec, SubmitRequest, SystemClock};
/// use booking_runtime::{BookingEngine, EngineConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> booking_core::Result<()> {
/// let engine = BookingEngine::new(
///     EngineConfig::default(),
///     Arc::new(SystemClock),
///     ApprovingPaymentGate::shared(),
/// );
/// let offering = engine.register_offering(OfferingSpec::new("Chess club", 12))?;
/// let subject = engine.register_subject("Ada")?;
///
/// let result = engine
///     .submit(SubmitRequest::new(offering.id, subject.id, "enrol-ada-chess"))
///     .await?;
/// println!("{}", result.status_label);
/// # Ok(())
/// # }
/// ```
///
/// Clones share the same state.
#[derive(Clone)]
pub struct BookingEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    gate: Arc<dyn PaymentGate>,
    offerings: Arc<RwLock<HashMap<OfferingId, Arc<Mutex<OfferingState>>>>>,
    index: Arc<RwLock<HashMap<BookingId, OfferingId>>>,
    subjects: Arc<RwLock<HashMap<SubjectId, Subject>>>,
    submissions: Arc<CommandLog<BookingResult>>,
    cancellations: Arc<CommandLog<CancelOutcome>>,
    confirmations: Arc<CommandLog<BookingResult>>,
}

impl fmt::Debug for BookingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookingEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BookingEngine {
    /// Create an engine with no offerings or subjects.
    #[must_use]
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, gate: Arc<dyn PaymentGate>) -> Self {
        Self {
            submissions: Arc::new(CommandLog::new("submit", Arc::clone(&clock))),
            cancellations: Arc::new(CommandLog::new("cancel", Arc::clone(&clock))),
            confirmations: Arc::new(CommandLog::new("confirm", Arc::clone(&clock))),
            config,
            clock,
            gate,
            offerings: Arc::new(RwLock::new(HashMap::new())),
            index: Arc::new(RwLock::new(HashMap::new())),
            subjects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time according to the engine's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Register a new offering.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] if the name is blank.
    #[tracing::instrument(skip(self, spec), fields(name = %spec.name, capacity = spec.capacity))]
    pub fn register_offering(&self, spec: OfferingSpec) -> Result<OfferingSnapshot> {
        if spec.name.trim().is_empty() {
            return Err(BookingError::validation("offering name must not be empty"));
        }
        let id = OfferingId::new();
        let state = OfferingState::new(Offering::from_spec(id, &spec), spec.capacity);
        let snapshot = state.snapshot();

        self.offerings
            .write()
            .map_err(|e| poisoned("offering table", e))?
            .insert(id, Arc::new(Mutex::new(state)));

        tracing::info!(offering = %id, "Offering registered");
        Ok(snapshot)
    }

    /// Register a new subject.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] if the name is blank.
    pub fn register_subject(&self, name: impl Into<String>) -> Result<Subject> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BookingError::validation("subject name must not be empty"));
        }
        let subject = Subject {
            id: SubjectId::new(),
            name,
        };
        self.subjects
            .write()
            .map_err(|e| poisoned("subject directory", e))?
            .insert(subject.id, subject.clone());

        tracing::debug!(subject = %subject.id, "Subject registered");
        Ok(subject)
    }

    /// Look up a registered subject.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::UnknownSubject`] if it is not registered.
    pub fn subject(&self, id: SubjectId) -> Result<Subject> {
        self.subjects
            .read()
            .map_err(|e| poisoned("subject directory", e))?
            .get(&id)
            .cloned()
            .ok_or(BookingError::UnknownSubject(id))
    }

    /// Open or close an offering for new submissions.
    ///
    /// Existing bookings, the queue and outstanding offers are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::UnknownOffering`] if it is not registered.
    pub fn set_accepting(&self, offering: OfferingId, accepting: bool) -> Result<OfferingSnapshot> {
        let slot = self.slot(offering)?;
        let mut state = lock_state(&slot)?;
        state.offering.accepting = accepting;
        tracing::info!(offering = %offering, accepting, "Offering availability changed");
        Ok(state.snapshot())
    }

    /// Change an offering's capacity. Growth promotes waitlisted bookings.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] if `capacity` is below the seats
    /// already confirmed or held.
    #[tracing::instrument(skip(self), fields(offering = %offering))]
    pub fn resize_capacity(&self, offering: OfferingId, capacity: u32) -> Result<OfferingSnapshot> {
        let slot = self.slot(offering)?;
        let now = self.clock.now();
        let mut state = lock_state(&slot)?;

        state.ledger.resize(capacity).map_err(|e| match e {
            LedgerError::BelowInUse { .. } => BookingError::Validation(e.to_string()),
            other => other.into(),
        })?;
        let promoted = state.promote(now, self.config.offer_ttl())?;
        BookingMetrics::record_promotions(promoted.len());

        tracing::info!(capacity, promoted = promoted.len(), "Offering resized");
        Ok(state.snapshot())
    }

    /// Read model for an offering.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::UnknownOffering`] if it is not registered.
    pub fn offering_snapshot(&self, offering: OfferingId) -> Result<OfferingSnapshot> {
        let slot = self.slot(offering)?;
        let state = lock_state(&slot)?;
        Ok(state.snapshot())
    }

    /// Current result view of a booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::UnknownBooking`] if it does not exist.
    pub fn booking(&self, id: BookingId) -> Result<BookingResult> {
        let slot = self.locate(id)?;
        let state = lock_state(&slot)?;
        state.result(id)
    }

    /// Full booking record including its audit trail.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::UnknownBooking`] if it does not exist.
    pub fn booking_record(&self, id: BookingId) -> Result<Booking> {
        let slot = self.locate(id)?;
        let state = lock_state(&slot)?;
        state.booking(id).cloned()
    }

    /// Queue position of a booking, `None` unless it is waitlisted.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::UnknownBooking`] if it does not exist.
    pub fn waitlist_position(&self, id: BookingId) -> Result<WaitlistPosition> {
        let slot = self.locate(id)?;
        let state = lock_state(&slot)?;
        state.booking(id)?;
        Ok(WaitlistPosition {
            booking_id: id,
            position: state.waitlist.position_of(id),
            queue_length: state.waitlist.len(),
        })
    }

    /// Resolve a tagged reference against the engine's tables.
    ///
    /// # Errors
    ///
    /// Returns the matching `Unknown*` error if nothing is registered under
    /// the reference.
    pub fn resolve(&self, reference: Reference) -> Result<Resolved> {
        match reference.kind {
            ReferenceKind::Offering => self
                .offering_snapshot(OfferingId::from_uuid(reference.id))
                .map(Resolved::Offering),
            ReferenceKind::Booking => self
                .booking(BookingId::from_uuid(reference.id))
                .map(Resolved::Booking),
            ReferenceKind::Subject => self
                .subject(SubjectId::from_uuid(reference.id))
                .map(Resolved::Subject),
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Book a subject onto an offering.
    ///
    /// Confirms immediately when a seat is free and no fee is due, charges the
    /// payment gate first when one is, and waitlists when the offering is full
    /// or anyone is already waiting. Repeating the call with the same
    /// idempotency key returns the first result without acting again.
    ///
    /// The command runs on its own task. If the caller stops waiting, the
    /// charge still settles and the result is still recorded under the key.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`], [`BookingError::UnknownSubject`],
    ///   [`BookingError::UnknownOffering`], [`BookingError::OfferingClosed`]
    ///   for invalid requests
    /// - [`BookingError::DuplicateSubmission`] if the subject already holds a
    ///   live booking on the offering
    /// - [`BookingError::IdempotencyConflict`] if the key was used for
    ///   different content
    /// - [`BookingError::PaymentDeclined`] / [`BookingError::PaymentUnavailable`]
    ///   if the charge failed; the seat has been released
    #[tracing::instrument(
        skip(self, request),
        fields(offering = %request.offering, subject = %request.subject)
    )]
    pub async fn submit(&self, request: SubmitRequest) -> Result<BookingResult> {
        validate_key(&request.idempotency_key)?;
        let key = request.idempotency_key.clone();
        let fingerprint = request.fingerprint();

        let engine = self.clone();
        let outcome = detached(async move {
            engine
                .submissions
                .run(&key, fingerprint, || engine.place(request))
                .await
        })
        .await;

        if let Err(err) = &outcome {
            if !matches!(
                err,
                BookingError::PaymentDeclined { .. } | BookingError::PaymentUnavailable { .. }
            ) {
                BookingMetrics::record_submission("failed");
            }
            tracing::debug!(error = %err, "Submission failed");
        }
        outcome
    }

    /// Run the same submission for each row, in order.
    ///
    /// # Errors
    ///
    /// Fails as a whole only when the batch itself is invalid (unknown
    /// offering, no rows, too many rows). Row failures are reported per row.
    pub async fn submit_batch(
        &self,
        offering: OfferingId,
        rows: Vec<BatchRow>,
        request_surface: RequestSurface,
    ) -> Result<BatchOutcome> {
        BatchCoordinator::new(self)
            .run(offering, rows, request_surface)
            .await
    }

    /// Cancel a booking, freeing its seat or queue slot.
    ///
    /// A freed seat is offered to the head of the waitlist; the outcome
    /// carries that booking's new state. Cancelling an already cancelled
    /// booking returns it unchanged.
    ///
    /// # Errors
    ///
    /// - [`BookingError::UnknownBooking`] if it does not exist
    /// - [`BookingError::InvalidTransition`] from `Pending` or `Rejected`
    /// - [`BookingError::SettlementInProgress`] while a confirmation charge is
    ///   in flight
    #[tracing::instrument(skip(self, reason), fields(booking = %booking))]
    pub async fn cancel(&self, booking: BookingId, reason: Option<String>) -> Result<CancelOutcome> {
        let key = booking.to_string();
        self.cancellations
            .run(&key, key.clone(), move || async move {
                self.cancel_now(booking, reason)
            })
            .await
    }

    /// Accept an outstanding seat offer.
    ///
    /// Free offerings confirm at once. Paid offerings charge the payment gate;
    /// on failure the seat goes to the next waiting booking and this one
    /// rejoins the queue at the tail. Repeated confirms return the first
    /// successful result and never charge twice. Like [`Self::submit`], the
    /// confirmation runs on its own task and settles even if the caller leaves.
    ///
    /// # Errors
    ///
    /// - [`BookingError::OfferExpired`] if the offer deadline has passed
    /// - [`BookingError::InvalidTransition`] if the booking was never offered
    /// - [`BookingError::SettlementInProgress`] if another confirm is charging
    /// - [`BookingError::PaymentDeclined`] / [`BookingError::PaymentUnavailable`]
    #[tracing::instrument(skip(self), fields(booking = %booking))]
    pub async fn confirm_offer(&self, booking: BookingId) -> Result<BookingResult> {
        let key = booking.to_string();
        let engine = self.clone();
        detached(async move {
            engine
                .confirmations
                .run(&key, key.clone(), || engine.confirm_now(booking))
                .await
        })
        .await
    }

    /// Turn down an outstanding offer. The booking rejoins the queue at the
    /// tail and the seat goes to the queue head.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidTransition`] unless the booking is `Offered`
    /// - [`BookingError::OfferExpired`] if the offer is already gone
    /// - [`BookingError::SettlementInProgress`] while a confirm is charging
    #[tracing::instrument(skip(self), fields(booking = %booking))]
    pub fn decline_offer(&self, booking: BookingId) -> Result<BookingResult> {
        let slot = self.locate(booking)?;
        let now = self.clock.now();
        let mut state = lock_state(&slot)?;

        let status = state.booking(booking)?.status;
        if status != BookingStatus::Offered {
            return Err(BookingError::InvalidTransition {
                booking,
                status,
                action: "declined",
            });
        }
        match state.offers.get(booking).map(|offer| offer.state) {
            None => return Err(BookingError::OfferExpired(booking)),
            Some(OfferState::Settling) => return Err(BookingError::SettlementInProgress(booking)),
            Some(OfferState::Open) => {}
        }

        let position = state.expire_offer(booking, now)?;
        let promoted = state.promote(now, self.config.offer_ttl())?;
        BookingMetrics::record_promotions(promoted.len());

        tracing::info!(position, promoted = promoted.len(), "Offer declined");
        state.result(booking)
    }

    /// Expire every open offer past its deadline and hand the seats on.
    ///
    /// Expired bookings rejoin their queue at the tail in deadline order.
    /// Offers whose confirmation is being charged are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Internal`] only if the offering table cannot be
    /// read. An offering whose state is unusable is logged, counted in
    /// [`SweepReport::failed`] and skipped; the rest are still swept.
    #[tracing::instrument(skip(self))]
    pub fn expire_due_offers(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let slots: Vec<Arc<Mutex<OfferingState>>> = self
            .offerings
            .read()
            .map_err(|e| poisoned("offering table", e))?
            .values()
            .cloned()
            .collect();

        let mut report = SweepReport::default();
        for slot in slots {
            if let Err(err) = self.sweep_offering(&slot, now, &mut report) {
                report.failed += 1;
                tracing::error!(error = %err, "Offering sweep failed, continuing");
            }
        }

        BookingMetrics::record_expired(report.expired);
        BookingMetrics::record_promotions(report.promoted);
        Ok(report)
    }

    /// Sweep one offering, counting into `report` as each step lands.
    fn sweep_offering(
        &self,
        slot: &Mutex<OfferingState>,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<()> {
        let mut state = lock_state(slot)?;
        let due = state.offers.due(now);
        if due.is_empty() {
            return Ok(());
        }
        for offer in &due {
            let position = state.expire_offer(offer.booking, now)?;
            report.expired += 1;
            tracing::info!(
                offering = %state.offering.id,
                booking = %offer.booking,
                position,
                "Offer expired"
            );
        }
        report.promoted += state.promote(now, self.config.offer_ttl())?.len();
        Ok(())
    }

    /// Drop idempotency records written before `older_than`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Internal`] if a log lock is poisoned.
    pub fn purge_idempotency_records(&self, older_than: DateTime<Utc>) -> Result<usize> {
        Ok(self.submissions.purge_older_than(older_than)?
            + self.cancellations.purge_older_than(older_than)?
            + self.confirmations.purge_older_than(older_than)?)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn slot(&self, offering: OfferingId) -> Result<Arc<Mutex<OfferingState>>> {
        self.offerings
            .read()
            .map_err(|e| poisoned("offering table", e))?
            .get(&offering)
            .cloned()
            .ok_or(BookingError::UnknownOffering(offering))
    }

    fn locate(&self, booking: BookingId) -> Result<Arc<Mutex<OfferingState>>> {
        let offering = self
            .index
            .read()
            .map_err(|e| poisoned("booking index", e))?
            .get(&booking)
            .copied()
            .ok_or(BookingError::UnknownBooking(booking))?;
        self.slot(offering)
    }

    fn ensure_subject(&self, subject: SubjectId) -> Result<()> {
        let subjects = self
            .subjects
            .read()
            .map_err(|e| poisoned("subject directory", e))?;
        if subjects.contains_key(&subject) {
            Ok(())
        } else {
            Err(BookingError::UnknownSubject(subject))
        }
    }

    fn validate_choices(&self, request: &SubmitRequest) -> Result<()> {
        let mut seen = HashSet::new();
        for choice in &request.choices {
            if *choice == request.offering {
                return Err(BookingError::validation(
                    "choices must not repeat the requested offering",
                ));
            }
            if !seen.insert(*choice) {
                return Err(BookingError::validation(format!(
                    "choice {choice} is listed more than once"
                )));
            }
        }

        let offerings = self
            .offerings
            .read()
            .map_err(|e| poisoned("offering table", e))?;
        match request.choices.iter().find(|c| !offerings.contains_key(c)) {
            Some(missing) => Err(BookingError::validation(format!(
                "choice {missing} is not a registered offering"
            ))),
            None => Ok(()),
        }
    }

    async fn place(&self, request: SubmitRequest) -> Result<BookingResult> {
        self.ensure_subject(request.subject)?;
        let slot = self.slot(request.offering)?;
        self.validate_choices(&request)?;

        match self.admit(&slot, &request)? {
            Admission::Placed(result) => Ok(result),
            Admission::AwaitingPayment(charge) => {
                let booking = charge.booking;
                let outcome = self.charge(charge).await;
                self.settle_submission(&slot, booking, outcome)
            }
        }
    }

    /// Locked phase of a submission: waitlist, confirm, or hold for payment.
    fn admit(&self, slot: &Mutex<OfferingState>, request: &SubmitRequest) -> Result<Admission> {
        let now = self.clock.now();
        let mut guard = lock_state(slot)?;
        let state = &mut *guard;

        if !state.offering.accepting {
            return Err(BookingError::OfferingClosed(state.offering.id));
        }
        if let Some(existing) = state.active_by_subject.get(&request.subject) {
            return Err(BookingError::DuplicateSubmission {
                subject: request.subject,
                offering: request.offering,
                existing: *existing,
            });
        }

        let mut index = self
            .index
            .write()
            .map_err(|e| poisoned("booking index", e))?;
        let id = BookingId::new();
        let sequence = state.next_sequence();
        let status = if !state.waitlist.is_empty() || state.ledger.reserve() == Reservation::Full {
            state.waitlist.enqueue(id, sequence);
            BookingStatus::Waitlisted
        } else if state.offering.payment_required() {
            BookingStatus::Pending
        } else {
            state.ledger.commit_held()?;
            BookingStatus::Confirmed
        };

        let booking = Booking::new(id, &state.offering, request, sequence, status, now);
        state.bookings.insert(id, booking);
        state.active_by_subject.insert(request.subject, id);
        index.insert(id, request.offering);
        drop(index);

        tracing::info!(booking = %id, status = %status, sequence, "Booking placed");

        match status {
            BookingStatus::Pending => Ok(Admission::AwaitingPayment(PaymentRequest {
                booking: id,
                offering: state.offering.id,
                subject: request.subject,
                payer: request.payer.clone(),
                amount: state.offering.fee,
                idempotency_key: format!("{id}:submit"),
            })),
            BookingStatus::Waitlisted => {
                BookingMetrics::record_submission("waitlisted");
                state.result(id).map(Admission::Placed)
            }
            _ => {
                BookingMetrics::record_submission("confirmed");
                state.result(id).map(Admission::Placed)
            }
        }
    }

    async fn charge(&self, request: PaymentRequest) -> GatewayResult<PaymentReceipt> {
        let booking = request.booking;
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.payment_timeout(), self.gate.charge(request))
            .await
            .unwrap_or(Err(PaymentGateError::Timeout));
        PaymentMetrics::record_call(started.elapsed());

        if let Err(err) = &outcome {
            PaymentMetrics::record_failure(failure_kind(err));
            tracing::warn!(booking = %booking, error = %err, "Payment failed");
        }
        outcome
    }

    /// Locked phase after the submission charge: commit or roll back the hold.
    fn settle_submission(
        &self,
        slot: &Mutex<OfferingState>,
        id: BookingId,
        outcome: GatewayResult<PaymentReceipt>,
    ) -> Result<BookingResult> {
        let now = self.clock.now();
        let mut state = lock_state(slot)?;
        state.booking(id)?;

        match outcome {
            Ok(receipt) => {
                state.ledger.commit_held()?;
                let booking = state.booking_mut(id)?;
                booking.payment_state = PaymentState::Settled;
                booking.payment_reference = Some(receipt.reference);
                booking.transition(BookingStatus::Confirmed, now);

                BookingMetrics::record_submission("confirmed");
                tracing::info!(booking = %id, "Booking confirmed after payment");
                state.result(id)
            }
            Err(err) => {
                state.ledger.release_held()?;
                let booking = state.booking_mut(id)?;
                mark_declined(booking, &err);
                booking.transition(BookingStatus::Rejected, now);
                let subject = booking.subject;
                state.release_subject(subject, id);

                let promoted = state.promote(now, self.config.offer_ttl())?;
                BookingMetrics::record_promotions(promoted.len());
                BookingMetrics::record_submission("rejected");
                tracing::info!(booking = %id, "Booking rejected, seat released");
                Err(payment_error(id, err))
            }
        }
    }

    fn cancel_now(&self, id: BookingId, reason: Option<String>) -> Result<CancelOutcome> {
        let slot = self.locate(id)?;
        let now = self.clock.now();
        let mut state = lock_state(&slot)?;

        let status = state.booking(id)?.status;
        match status {
            BookingStatus::Cancelled => {
                return Ok(CancelOutcome {
                    ok: true,
                    booking: state.result(id)?,
                    promoted_waitlist_booking: None,
                });
            }
            BookingStatus::Confirmed => state.ledger.release_confirmed()?,
            BookingStatus::Offered => match state.offers.get(id).map(|offer| offer.state) {
                Some(OfferState::Open) => {
                    state.ledger.release_held()?;
                    state.offers.take(id);
                }
                Some(OfferState::Settling) => {
                    return Err(BookingError::SettlementInProgress(id));
                }
                None => {
                    return Err(BookingError::Invariant(format!(
                        "offered booking {id} has no offer"
                    )));
                }
            },
            BookingStatus::Waitlisted => {
                state.waitlist.remove(id);
            }
            BookingStatus::Pending | BookingStatus::Rejected => {
                return Err(BookingError::InvalidTransition {
                    booking: id,
                    status,
                    action: "cancelled",
                });
            }
        }

        let booking = state.booking_mut(id)?;
        booking.cancellation_reason = reason;
        booking.transition(BookingStatus::Cancelled, now);
        let subject = booking.subject;
        state.release_subject(subject, id);

        let promoted = if status.holds_seat() {
            state.promote(now, self.config.offer_ttl())?
        } else {
            Vec::new()
        };
        BookingMetrics::record_cancellation();
        BookingMetrics::record_promotions(promoted.len());
        tracing::info!(from = %status, promoted = promoted.len(), "Booking cancelled");

        let promoted_waitlist_booking = promoted
            .first()
            .map(|promoted| state.result(*promoted))
            .transpose()?;
        Ok(CancelOutcome {
            ok: true,
            booking: state.result(id)?,
            promoted_waitlist_booking,
        })
    }

    async fn confirm_now(&self, id: BookingId) -> Result<BookingResult> {
        let slot = self.locate(id)?;
        match self.begin_confirm(&slot, id)? {
            Confirmation::Done(result) => Ok(result),
            Confirmation::Charge(request) => {
                let outcome = self.charge(request).await;
                self.settle_confirmation(&slot, id, outcome)
            }
        }
    }

    /// Locked first phase of a confirmation.
    fn begin_confirm(&self, slot: &Mutex<OfferingState>, id: BookingId) -> Result<Confirmation> {
        let now = self.clock.now();
        let mut state = lock_state(slot)?;

        let booking = state.booking(id)?;
        match booking.status {
            BookingStatus::Confirmed => return state.result(id).map(Confirmation::Done),
            BookingStatus::Offered => {}
            BookingStatus::Waitlisted
                if booking
                    .history
                    .iter()
                    .any(|change| change.to == BookingStatus::Offered) =>
            {
                return Err(BookingError::OfferExpired(id));
            }
            status => {
                return Err(BookingError::InvalidTransition {
                    booking: id,
                    status,
                    action: "confirmed",
                });
            }
        }

        let Some(offer) = state.offers.get(id).copied() else {
            return Err(BookingError::OfferExpired(id));
        };
        if offer.state == OfferState::Settling {
            return Err(BookingError::SettlementInProgress(id));
        }
        if offer.is_due(now) {
            state.expire_offer(id, now)?;
            let promoted = state.promote(now, self.config.offer_ttl())?;
            BookingMetrics::record_expired(1);
            BookingMetrics::record_promotions(promoted.len());
            tracing::info!(expired_at = %offer.expires_at, "Offer expired before confirmation");
            return Err(BookingError::OfferExpired(id));
        }

        if !state.offering.payment_required() {
            state.ledger.commit_held()?;
            state.offers.take(id);
            state.booking_mut(id)?.transition(BookingStatus::Confirmed, now);
            tracing::info!("Offer confirmed");
            return state.result(id).map(Confirmation::Done);
        }

        state.offers.begin_settlement(id);
        let booking = state.booking(id)?;
        Ok(Confirmation::Charge(PaymentRequest {
            booking: id,
            offering: booking.offering,
            subject: booking.subject,
            payer: booking.payer.clone(),
            amount: booking.amount,
            idempotency_key: format!("{id}:confirm:{}", booking.sequence),
        }))
    }

    /// Locked phase after the confirmation charge.
    fn settle_confirmation(
        &self,
        slot: &Mutex<OfferingState>,
        id: BookingId,
        outcome: GatewayResult<PaymentReceipt>,
    ) -> Result<BookingResult> {
        let now = self.clock.now();
        let mut state = lock_state(slot)?;
        state.booking(id)?;
        if state.offers.get(id).is_none() {
            return Err(BookingError::Invariant(format!(
                "settling booking {id} lost its offer"
            )));
        }

        match outcome {
            Ok(receipt) => {
                state.ledger.commit_held()?;
                state.offers.take(id);
                let booking = state.booking_mut(id)?;
                booking.payment_state = PaymentState::Settled;
                booking.payment_reference = Some(receipt.reference);
                booking.transition(BookingStatus::Confirmed, now);

                tracing::info!("Offer confirmed after payment");
                state.result(id)
            }
            Err(err) => {
                let position = state.expire_offer(id, now)?;
                mark_declined(state.booking_mut(id)?, &err);
                let promoted = state.promote(now, self.config.offer_ttl())?;
                BookingMetrics::record_promotions(promoted.len());

                tracing::info!(position, "Offer payment failed, booking re-queued");
                Err(payment_error(id, err))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use booking_core::{ApprovingPaymentGate, SystemClock};

    fn engine() -> BookingEngine {
        BookingEngine::new(
            EngineConfig::default(),
            Arc::new(SystemClock),
            ApprovingPaymentGate::shared(),
        )
    }

    fn offering_state(capacity: u32) -> OfferingState {
        let offering = Offering::from_spec(OfferingId::new(), &OfferingSpec::new("Choir", capacity));
        OfferingState::new(offering, capacity)
    }

    fn waitlisted(state: &mut OfferingState, now: DateTime<Utc>) -> BookingId {
        let id = BookingId::new();
        let sequence = state.next_sequence();
        let request = SubmitRequest::new(state.offering.id, SubjectId::new(), id.to_string());
        let booking = Booking::new(
            id,
            &state.offering,
            &request,
            sequence,
            BookingStatus::Waitlisted,
            now,
        );
        state.bookings.insert(id, booking);
        state.waitlist.enqueue(id, sequence);
        id
    }

    #[test]
    fn promote_offers_head_until_seats_run_out() {
        let now = Utc::now();
        let mut state = offering_state(1);
        let first = waitlisted(&mut state, now);
        let second = waitlisted(&mut state, now);

        let promoted = state.promote(now, chrono::Duration::hours(1)).unwrap();
        assert_eq!(promoted, vec![first]);
        assert_eq!(state.ledger.snapshot().held, 1);
        assert_eq!(state.waitlist.position_of(second), Some(1));

        let booking = state.booking(first).unwrap();
        assert_eq!(booking.status, BookingStatus::Offered);
        assert_eq!(booking.offer_expires_at, Some(now + chrono::Duration::hours(1)));
    }

    #[test]
    fn expire_offer_requeues_behind_existing_waiters() {
        let now = Utc::now();
        let mut state = offering_state(1);
        let first = waitlisted(&mut state, now);
        let second = waitlisted(&mut state, now);
        state.promote(now, chrono::Duration::minutes(5)).unwrap();

        let position = state.expire_offer(first, now).unwrap();
        assert_eq!(position, 2);
        assert_eq!(state.ledger.snapshot().held, 0);
        assert!(state.offers.is_empty());

        let booking = state.booking(first).unwrap();
        assert_eq!(booking.status, BookingStatus::Waitlisted);
        assert_eq!(booking.sequence, 3);
        assert_eq!(booking.offer_expires_at, None);
        assert_eq!(state.waitlist.head().unwrap().booking, second);
    }

    #[test]
    fn expire_offer_without_offer_changes_nothing() {
        let now = Utc::now();
        let mut state = offering_state(1);
        let id = waitlisted(&mut state, now);
        assert!(matches!(
            state.expire_offer(id, now),
            Err(BookingError::Invariant(_))
        ));
        assert_eq!(state.waitlist.len(), 1);
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("k").is_ok());
        assert!(validate_key("   ").is_err());
        assert!(validate_key(&"x".repeat(MAX_IDEMPOTENCY_KEY_LEN)).is_ok());
        assert!(validate_key(&"x".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn registry_rejects_blank_names() {
        let engine = engine();
        assert!(matches!(
            engine.register_offering(OfferingSpec::new(" ", 3)),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            engine.register_subject(""),
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn resolve_dispatches_on_kind() {
        let engine = engine();
        let offering = engine.register_offering(OfferingSpec::new("Drama", 4)).unwrap();
        let subject = engine.register_subject("Grace").unwrap();

        assert!(matches!(
            engine.resolve(Reference::offering(offering.id)).unwrap(),
            Resolved::Offering(snapshot) if snapshot.capacity == 4
        ));
        assert!(matches!(
            engine.resolve(Reference::subject(subject.id)).unwrap(),
            Resolved::Subject(found) if found.name == "Grace"
        ));
        assert!(matches!(
            engine.resolve(Reference::booking(BookingId::new())),
            Err(BookingError::UnknownBooking(_))
        ));
    }

    #[tokio::test]
    async fn shrinking_below_seats_in_use_is_a_validation_error() {
        let engine = engine();
        let offering = engine.register_offering(OfferingSpec::new("Art", 2)).unwrap();
        for name in ["a", "b"] {
            let subject = engine.register_subject(name).unwrap();
            engine
                .submit(SubmitRequest::new(offering.id, subject.id, format!("key-{name}")))
                .await
                .unwrap();
        }

        assert!(matches!(
            engine.resize_capacity(offering.id, 1),
            Err(BookingError::Validation(_))
        ));
        assert_eq!(engine.offering_snapshot(offering.id).unwrap().capacity, 2);
    }

    /// Offering with one confirmed booking and one immediately due offer.
    async fn offering_with_due_offer(engine: &BookingEngine, name: &str) -> (OfferingId, BookingId) {
        let offering = engine.register_offering(OfferingSpec::new(name, 1)).unwrap();
        let holder = engine.register_subject(format!("{name} holder")).unwrap();
        let waiter = engine.register_subject(format!("{name} waiter")).unwrap();
        let held = engine
            .submit(SubmitRequest::new(offering.id, holder.id, format!("{name}-holder")))
            .await
            .unwrap();
        let waiting = engine
            .submit(SubmitRequest::new(offering.id, waiter.id, format!("{name}-waiter")))
            .await
            .unwrap();
        engine.cancel(held.booking_id, None).await.unwrap();
        (offering.id, waiting.booking_id)
    }

    #[tokio::test]
    async fn sweep_skips_an_unusable_offering_and_continues() {
        let engine = BookingEngine::new(
            EngineConfig {
                offer_ttl_secs: 0,
                ..EngineConfig::default()
            },
            Arc::new(SystemClock),
            ApprovingPaymentGate::shared(),
        );
        let (broken, _) = offering_with_due_offer(&engine, "Broken").await;
        let (healthy, waiter) = offering_with_due_offer(&engine, "Healthy").await;

        let slot = engine.slot(broken).unwrap();
        let _ = std::thread::spawn(move || {
            let _guard = slot.lock();
            std::panic::resume_unwind(Box::new("offering state corrupted"));
        })
        .join();

        let report = engine.expire_due_offers().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.expired, 1);
        assert_eq!(report.promoted, 1);

        let booking = engine.booking_record(waiter).unwrap();
        assert_eq!(booking.status, BookingStatus::Offered);
        let offers = booking
            .history
            .iter()
            .filter(|change| change.to == BookingStatus::Offered)
            .count();
        assert_eq!(offers, 2);
        assert_eq!(engine.offering_snapshot(healthy).unwrap().held, 1);
    }

    #[tokio::test]
    async fn refused_submission_leaves_no_index_entry() {
        let engine = engine();
        let offering = engine.register_offering(OfferingSpec::new("Pottery", 3)).unwrap();
        let subject = engine.register_subject("Lin").unwrap();
        engine.set_accepting(offering.id, false).unwrap();

        let err = engine
            .submit(SubmitRequest::new(offering.id, subject.id, "closed"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::OfferingClosed(_)));
        assert!(engine.index.read().unwrap().is_empty());

        engine.set_accepting(offering.id, true).unwrap();
        let placed = engine
            .submit(SubmitRequest::new(offering.id, subject.id, "open"))
            .await
            .unwrap();
        assert_eq!(engine.index.read().unwrap().get(&placed.booking_id), Some(&offering.id));
    }
}
