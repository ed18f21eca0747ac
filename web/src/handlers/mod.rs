//! HTTP request handlers, one module per resource.

pub mod bookings;
pub mod health;
pub mod metrics;
pub mod offerings;
pub mod subjects;

use crate::error::AppError;
use std::future::Future;

pub use health::health_check;

/// Run an engine command on its own task.
///
/// A client that disconnects drops the handler future; the command keeps
/// running, so a batch always processes every row it was given.
pub(crate) async fn detached<T, F>(command: F) -> Result<T, AppError>
where
    F: Future<Output = booking_core::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(command)
        .await
        .map_err(|e| AppError::from(anyhow::Error::new(e).context("engine task failed")))?
        .map_err(AppError::from)
}
