//! Outstanding seat offers for one offering.
//!
//! An offer exists only while its booking is `Offered` and its seat is held in
//! the ledger. While the confirming caller is talking to the payment gate the
//! offer is `Settling`: the sweeper leaves it alone and a second confirm is
//! refused, so the held seat cannot be expired out from under the charge.
//!
//! [`OfferManager`] drives expiry: a background task that periodically sweeps
//! every offering for offers past their deadline.

use crate::engine::{BookingEngine, SweepReport};
use booking_core::{BookingId, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Lifecycle of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferState {
    /// Awaiting confirmation
    Open,
    /// Confirmation in progress with the payment gate
    Settling,
}

/// A held seat offered to a promoted booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offer {
    /// Booking the seat is offered to
    pub booking: BookingId,
    /// Deadline for confirmation
    pub expires_at: DateTime<Utc>,
    /// Current state
    pub state: OfferState,
}

impl Offer {
    /// Whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Offers keyed by booking.
#[derive(Debug, Clone, Default)]
pub struct OfferBook {
    offers: HashMap<BookingId, Offer>,
}

impl OfferBook {
    /// Empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an open offer. Replaces any previous offer for the booking.
    pub fn extend(&mut self, booking: BookingId, expires_at: DateTime<Utc>) -> Offer {
        let offer = Offer {
            booking,
            expires_at,
            state: OfferState::Open,
        };
        self.offers.insert(booking, offer);
        offer
    }

    /// Look up the offer for `booking`.
    #[must_use]
    pub fn get(&self, booking: BookingId) -> Option<&Offer> {
        self.offers.get(&booking)
    }

    /// Move an open offer to `Settling`.
    ///
    /// Returns `false` if there is no offer or it is already settling.
    pub fn begin_settlement(&mut self, booking: BookingId) -> bool {
        match self.offers.get_mut(&booking) {
            Some(offer) if offer.state == OfferState::Open => {
                offer.state = OfferState::Settling;
                true
            }
            _ => false,
        }
    }

    /// Remove and return the offer for `booking`.
    pub fn take(&mut self, booking: BookingId) -> Option<Offer> {
        self.offers.remove(&booking)
    }

    /// Open offers whose deadline has passed, earliest deadline first.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> Vec<Offer> {
        let mut due: Vec<Offer> = self
            .offers
            .values()
            .filter(|offer| offer.state == OfferState::Open && offer.is_due(now))
            .copied()
            .collect();
        due.sort_by_key(|offer| (offer.expires_at, offer.booking));
        due
    }

    /// Number of outstanding offers, settling ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    /// Whether no offers are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

/// Periodic offer expiry and idempotency housekeeping.
///
/// The confirmation window itself comes from the engine's configuration;
/// the manager decides how often it is enforced.
#[derive(Debug, Clone)]
pub struct OfferManager {
    engine: Arc<BookingEngine>,
    interval: Duration,
    retention: chrono::Duration,
}

impl OfferManager {
    /// Manager using the engine's configured sweep interval and retention.
    #[must_use]
    pub fn new(engine: Arc<BookingEngine>) -> Self {
        let interval = engine.config().sweep_interval();
        let retention = engine.config().idempotency_retention();
        Self {
            engine,
            interval,
            retention,
        }
    }

    /// Override the sweep interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sweep interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// One sweep: expire due offers, then purge old idempotency records.
    ///
    /// # Errors
    ///
    /// Returns the engine error that stopped the sweep.
    pub fn run_once(&self) -> Result<SweepReport> {
        let report = self.engine.expire_due_offers()?;
        let cutoff = self.engine.now() - self.retention;
        let purged = self.engine.purge_idempotency_records(cutoff)?;

        if report.expired > 0 || purged > 0 {
            tracing::info!(
                expired = report.expired,
                promoted = report.promoted,
                purged,
                "Offer sweep completed"
            );
        }
        Ok(report)
    }

    /// Spawn the sweep loop. It stops when `shutdown` changes or its sender
    /// is dropped.
    #[must_use]
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval = ?self.interval, "Starting offer sweeper");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once() {
                            tracing::error!(error = %e, "Offer sweep failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Offer sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}
