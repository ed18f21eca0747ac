//! # Booking Runtime
//!
//! The allocation engine behind activity bookings.
//!
//! ## Core Components
//!
//! - **`BookingEngine`**: public operations and the booking state machine
//! - **`CapacityLedger`**: per-offering capacity / confirmed / held counters
//! - **`WaitlistQueue`**: per-offering FIFO ordered by arrival
//! - **`OfferBook` / `OfferManager`**: time-boxed seat offers and their expiry sweep
//! - **`CommandLog`**: idempotent command execution keyed by caller keys
//! - **`BatchCoordinator`**: ordered multi-row submission with per-row outcomes
//!
//! ## Example
//!
//! ```ignore
//! use booking_runtime::{BookingEngine, EngineConfig, OfferManager};
//!
//! let engine = Arc::new(BookingEngine::new(EngineConfig::from_env()?, clock, gate));
//! let sweeper = OfferManager::new(Arc::clone(&engine)).spawn(shutdown_rx);
//!
//! let result = engine.submit(request).await?;
//! ```

/// Batch submission
pub mod batch;

/// Engine configuration
pub mod config;

/// The booking engine
pub mod engine;

/// Idempotent command execution
pub mod idempotency;

/// Seat accounting
pub mod ledger;

/// Prometheus metrics for observability
pub mod metrics;

/// Seat offers and their expiry
pub mod offers;

/// Waitlist queue
pub mod waitlist;

pub use batch::BatchCoordinator;
pub use config::{ConfigError, EngineConfig};
pub use engine::{BookingEngine, SweepReport, MAX_IDEMPOTENCY_KEY_LEN};
pub use idempotency::{CommandLog, CommandRecord};
pub use ledger::{CapacityLedger, LedgerError, Reservation};
pub use offers::{Offer, OfferBook, OfferManager, OfferState};
pub use waitlist::{WaitlistEntry, WaitlistQueue};
