//! # Booking Core
//!
//! Domain types, errors and collaborator traits for the activity booking
//! allocation engine.
//!
//! This crate has no runtime of its own. It defines the vocabulary shared by
//! the engine (`booking-runtime`), the test kit (`booking-testing`) and the
//! HTTP surface (`booking-web`):
//!
//! - **Identifiers and values**: [`OfferingId`], [`BookingId`], [`SubjectId`], [`Money`]
//! - **Bookings**: [`Booking`], [`BookingStatus`] and the [`BookingResult`] view
//! - **Commands**: [`SubmitRequest`], [`BatchRow`] and their outcomes
//! - **Errors**: [`BookingError`] with a stable [`ErrorKind`]
//! - **Environment**: the [`Clock`](environment::Clock) and
//!   [`PaymentGate`](payment::PaymentGate) seams
//!
//! ## Booking lifecycle
//!
//! ```text
//!            ┌────────────┐  payment ok   ┌───────────┐  cancel   ┌───────────┐
//! submit ──▶ │  Pending   │ ─────────────▶│ Confirmed │──────────▶│ Cancelled │
//!            └────────────┘               └───────────┘           └───────────┘
//!              │  full   │ payment failed       ▲                       ▲
//!              ▼         ▼                      │ confirm               │ cancel
//!      ┌────────────┐ ┌──────────┐  seat   ┌─────────┐                  │
//!      │ Waitlisted │ │ Rejected │  free   │ Offered │──────────────────┘
//!      └────────────┘ └──────────┘ ──────▶ └─────────┘
//!              ▲                               │ expired / declined
//!              └───────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod environment;
pub mod error;
pub mod payment;
pub mod types;

pub use chrono::{DateTime, Utc};

pub use environment::{Clock, SystemClock};
pub use error::{BookingError, ErrorKind, Result};
pub use payment::{ApprovingPaymentGate, PaymentGate, PaymentGateError, PaymentReceipt, PaymentRequest};
pub use types::*;
