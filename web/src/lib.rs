//! HTTP surface for the activity booking engine.
//!
//! Thin axum handlers over [`booking_runtime::BookingEngine`]. Handlers parse
//! the request, call one engine operation and map the result; all booking
//! rules live in the engine.
//!
//! # Request Flow
//!
//! 1. **Correlation id** attached by [`middleware::correlation_id_layer`]
//! 2. **Extract** path ids and the JSON body
//! 3. **Run** the engine command (detached when it may charge a payment)
//! 4. **Map** the result, or the [`BookingError`](booking_core::BookingError)
//!    through [`AppError`], to a response
//!
//! # Example
//!
//! ```ignore
//! use booking_web::{build_router, AppState};
//!
//! let app = build_router(AppState::new(engine));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::AppError;
pub use middleware::{correlation_id_layer, CorrelationId, CORRELATION_ID_HEADER};
pub use routes::build_router;
pub use state::AppState;
