//! # Booking Testing
//!
//! Test doubles and fixtures for the booking engine.
//!
//! This crate provides:
//! - [`mocks::ManualClock`]: time that only moves when a test says so
//! - [`mocks::ScriptedPaymentGate`]: a payment gate with queued outcomes
//! - [`EngineFixture`]: an engine wired to both, plus registration helpers
//!
//! ## Example
//!
//! ```ignore
//! use booking_testing::EngineFixture;
//!
//! #[tokio::test]
//! async fn full_offering_waitlists() {
//!     let fx = EngineFixture::new();
//!     let offering = fx.offering("Robotics", 1).unwrap();
//!     let [a, b] = fx.subjects().unwrap();
//!
//!     fx.submit(offering, a, "k-a").await.unwrap();
//!     let second = fx.submit(offering, b, "k-b").await.unwrap();
//!     assert_eq!(second.waitlist_position, Some(1));
//! }
//! ```

use booking_core::{
    BookingId, BookingResult, Money, OfferingId, OfferingSpec, Result, SubjectId, SubmitRequest,
};
use booking_runtime::{BookingEngine, EngineConfig};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use mocks::{ManualClock, ScriptedCharge, ScriptedPaymentGate, test_clock};

/// Mock implementations of the engine's collaborators.
pub mod mocks {
    use booking_core::payment::GatewayResult;
    use booking_core::{Clock, PaymentGate, PaymentGateError, PaymentReceipt, PaymentRequest};
    use chrono::{DateTime, Utc};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Manually advanced clock for deterministic tests.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the engine.
    ///
    /// # Example
    ///
    /// ```
    /// use booking_testing::mocks::test_clock;
    /// use booking_core::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = test_clock();
    /// let start = clock.now();
    /// clock.advance(Duration::hours(2));
    /// assert_eq!(clock.now() - start, Duration::hours(2));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                now: Arc::new(Mutex::new(time)),
            }
        }

        /// Move time forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut now = locked(&self.now);
            *now += by;
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *locked(&self.now) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *locked(&self.now)
        }
    }

    /// Create a default manual clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> ManualClock {
        ManualClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Outcome of one scripted charge.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ScriptedCharge {
        /// Approve and issue a reference
        Approve,
        /// Decline with a reference and reason
        Decline(String),
        /// Fail with a gate timeout
        Timeout,
        /// Fail with a gate outage
        Unavailable(String),
    }

    /// Payment gate that plays back queued outcomes.
    ///
    /// Once the script is exhausted every charge is approved. Every request is
    /// recorded for later assertions.
    #[derive(Debug, Default)]
    pub struct ScriptedPaymentGate {
        script: Mutex<VecDeque<ScriptedCharge>>,
        requests: Mutex<Vec<PaymentRequest>>,
        latency: Option<Duration>,
        paused: bool,
        release: Notify,
        issued: AtomicU64,
    }

    impl ScriptedPaymentGate {
        /// Gate that approves everything
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Gate that plays `outcomes` in order, then approves
        #[must_use]
        pub fn scripted(outcomes: impl IntoIterator<Item = ScriptedCharge>) -> Self {
            Self {
                script: Mutex::new(outcomes.into_iter().collect()),
                ..Self::default()
            }
        }

        /// Sleep this long inside every charge
        #[must_use]
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Block every charge until [`ScriptedPaymentGate::release`] is called
        #[must_use]
        pub fn paused(mut self) -> Self {
            self.paused = true;
            self
        }

        /// Let one paused charge finish
        pub fn release(&self) {
            self.release.notify_one();
        }

        /// Queue another outcome
        pub fn push(&self, outcome: ScriptedCharge) {
            locked(&self.script).push_back(outcome);
        }

        /// Number of charges attempted
        #[must_use]
        pub fn calls(&self) -> usize {
            locked(&self.requests).len()
        }

        /// Every request received, in order
        #[must_use]
        pub fn requests(&self) -> Vec<PaymentRequest> {
            locked(&self.requests).clone()
        }

        /// Wait until at least `count` charges have started
        pub async fn wait_for_calls(&self, count: usize) {
            while self.calls() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        }
    }

    impl PaymentGate for ScriptedPaymentGate {
        fn charge(
            &self,
            request: PaymentRequest,
        ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentReceipt>> + Send + '_>> {
            Box::pin(async move {
                let amount = request.amount;
                locked(&self.requests).push(request);
                let outcome = locked(&self.script)
                    .pop_front()
                    .unwrap_or(ScriptedCharge::Approve);

                if let Some(latency) = self.latency {
                    tokio::time::sleep(latency).await;
                }
                if self.paused {
                    self.release.notified().await;
                }

                let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                let reference = format!("test-obl-{sequence:04}");
                match outcome {
                    ScriptedCharge::Approve => Ok(PaymentReceipt { reference, amount }),
                    ScriptedCharge::Decline(reason) => Err(PaymentGateError::Declined {
                        reference: Some(reference),
                        reason,
                    }),
                    ScriptedCharge::Timeout => Err(PaymentGateError::Timeout),
                    ScriptedCharge::Unavailable(reason) => {
                        Err(PaymentGateError::Unavailable { reason })
                    }
                }
            })
        }
    }
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// An engine wired to a [`ManualClock`] and a [`ScriptedPaymentGate`].
#[derive(Debug, Clone)]
pub struct EngineFixture {
    /// Engine under test
    pub engine: Arc<BookingEngine>,
    /// Clock shared with the engine
    pub clock: ManualClock,
    /// Gate shared with the engine
    pub gate: Arc<ScriptedPaymentGate>,
}

impl Default for EngineFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFixture {
    /// Default configuration, approving gate
    #[must_use]
    pub fn new() -> Self {
        Self::with(EngineConfig::default(), ScriptedPaymentGate::new())
    }

    /// Default configuration, custom gate
    #[must_use]
    pub fn with_gate(gate: ScriptedPaymentGate) -> Self {
        Self::with(EngineConfig::default(), gate)
    }

    /// Custom configuration and gate
    #[must_use]
    pub fn with(config: EngineConfig, gate: ScriptedPaymentGate) -> Self {
        let clock = test_clock();
        let gate = Arc::new(gate);
        let engine = Arc::new(BookingEngine::new(
            config,
            Arc::new(clock.clone()),
            Arc::clone(&gate) as Arc<dyn booking_core::PaymentGate>,
        ));
        Self {
            engine,
            clock,
            gate,
        }
    }

    /// Register a free offering.
    ///
    /// # Errors
    ///
    /// Propagates registration errors.
    pub fn offering(&self, name: &str, capacity: u32) -> Result<OfferingId> {
        Ok(self
            .engine
            .register_offering(OfferingSpec::new(name, capacity).with_group(format!("{name} group")))?
            .id)
    }

    /// Register an offering with a fee.
    ///
    /// # Errors
    ///
    /// Propagates registration errors.
    pub fn paid_offering(&self, name: &str, capacity: u32, fee_cents: u64) -> Result<OfferingId> {
        Ok(self
            .engine
            .register_offering(
                OfferingSpec::new(name, capacity).with_fee(Money::from_cents(fee_cents)),
            )?
            .id)
    }

    /// Register `N` subjects.
    ///
    /// # Errors
    ///
    /// Propagates registration errors.
    pub fn subjects<const N: usize>(&self) -> Result<[SubjectId; N]> {
        let mut ids = [SubjectId::default(); N];
        for (index, id) in ids.iter_mut().enumerate() {
            *id = self.engine.register_subject(format!("Subject {}", index + 1))?.id;
        }
        Ok(ids)
    }

    /// Submit with no choices and no payer.
    ///
    /// # Errors
    ///
    /// Whatever [`BookingEngine::submit`] returns.
    pub async fn submit(
        &self,
        offering: OfferingId,
        subject: SubjectId,
        key: &str,
    ) -> Result<BookingResult> {
        self.engine
            .submit(SubmitRequest::new(offering, subject, key))
            .await
    }

    /// Current status label of a booking, for compact assertions.
    ///
    /// # Errors
    ///
    /// Returns [`booking_core::BookingError::UnknownBooking`] if absent.
    pub fn status(&self, booking: BookingId) -> Result<booking_core::BookingStatus> {
        Ok(self.engine.booking(booking)?.status)
    }

    /// Move the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }

    /// Current fixture time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        booking_core::Clock::now(&self.clock)
    }
}
