//! Idempotent command execution.
//!
//! Every mutating command carries a key. The first caller with a key claims a
//! slot and runs the command while holding the slot's async lock; concurrent
//! callers with the same key wait on that lock and then replay the stored
//! result instead of running the command again.
//!
//! # Behavior
//!
//! - **First request**: runs the command, records the result on success
//! - **Retry with the same key and content**: returns the recorded result
//! - **Same key, different content**: [`BookingError::IdempotencyConflict`]
//! - **Failed command**: nothing is recorded, so the key can be retried

use booking_core::{BookingError, Clock, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// A recorded command outcome.
#[derive(Debug, Clone)]
pub struct CommandRecord<T> {
    /// Canonical request content the key was first used with
    pub fingerprint: String,
    /// Result returned to the first caller
    pub result: T,
    /// When the result was recorded
    pub recorded_at: DateTime<Utc>,
}

type Slot<T> = Arc<AsyncMutex<Option<CommandRecord<T>>>>;

/// Key to result log for one command type.
pub struct CommandLog<T> {
    operation: &'static str,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T> std::fmt::Debug for CommandLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLog")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send> CommandLog<T> {
    /// Empty log for `operation` (used in errors and metric labels).
    #[must_use]
    pub fn new(operation: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            operation,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Run `command` at most once per `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::IdempotencyConflict`] if `key` was recorded with
    /// a different `fingerprint`, and otherwise whatever `command` returns.
    pub async fn run<F, Fut>(&self, key: &str, fingerprint: String, command: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let slot = self.claim(key)?;
        let mut record = slot.lock().await;

        if let Some(existing) = record.as_ref() {
            if existing.fingerprint != fingerprint {
                tracing::warn!(
                    operation = self.operation,
                    key = %key,
                    "Idempotency key reused with different content"
                );
                return Err(BookingError::IdempotencyConflict {
                    operation: self.operation,
                    key: key.to_string(),
                });
            }

            tracing::debug!(operation = self.operation, key = %key, "Replaying recorded result");
            metrics::counter!("booking_idempotent_replays_total", "operation" => self.operation)
                .increment(1);
            return Ok(existing.result.clone());
        }

        let result = command().await?;
        *record = Some(CommandRecord {
            fingerprint,
            result: result.clone(),
            recorded_at: self.clock.now(),
        });
        Ok(result)
    }

    /// The recorded result for `key`, if any and not currently being written.
    #[must_use]
    pub fn recorded(&self, key: &str) -> Option<CommandRecord<T>> {
        let slots = self.slots.lock().ok()?;
        let slot = slots.get(key)?;
        let guard = slot.try_lock().ok()?;
        guard.clone()
    }

    /// Drop records written before `cutoff`, plus abandoned empty slots.
    ///
    /// Slots that another caller currently holds are kept.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Internal`] if the slot table lock is poisoned.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut slots = self.slots.lock().map_err(|e| {
            BookingError::Internal(format!("{} log lock poisoned: {e}", self.operation))
        })?;
        let before = slots.len();

        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(record) => record
                    .as_ref()
                    .is_some_and(|record| record.recorded_at > cutoff),
                Err(_) => true,
            }
        });

        Ok(before - slots.len())
    }

    /// Number of keys tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().map_or(0, |slots| slots.len())
    }

    /// Whether no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn claim(&self, key: &str) -> Result<Slot<T>> {
        let mut slots = self.slots.lock().map_err(|e| {
            BookingError::Internal(format!("{} log lock poisoned: {e}", self.operation))
        })?;
        Ok(Arc::clone(
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use booking_core::SystemClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn log() -> CommandLog<u32> {
        CommandLog::new("submit", Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn replays_recorded_result() {
        let log = log();
        let runs = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = log
                .run("key-1", "a".to_string(), || async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(log.recorded("key-1").unwrap().fingerprint, "a");
    }

    #[tokio::test]
    async fn different_content_conflicts() {
        let log = log();
        log.run("key-1", "a".to_string(), || async { Ok(1) })
            .await
            .unwrap();

        let err = log
            .run("key-1", "b".to_string(), || async { Ok(2) })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::IdempotencyConflict { operation: "submit", ref key } if key == "key-1"
        ));
    }

    #[tokio::test]
    async fn failures_are_not_recorded() {
        let log = log();
        let err = log
            .run("key-1", "a".to_string(), || async {
                Err(BookingError::validation("nope"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        assert!(log.recorded("key-1").is_none());

        let value = log
            .run("key-1", "a".to_string(), || async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn purge_drops_old_records_only() {
        let log = log();
        log.run("old", "a".to_string(), || async { Ok(1) })
            .await
            .unwrap();
        let cutoff = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        log.run("new", "a".to_string(), || async { Ok(2) })
            .await
            .unwrap();

        assert_eq!(log.purge_older_than(cutoff).unwrap(), 1);
        assert!(log.recorded("old").is_none());
        assert!(log.recorded("new").is_some());
        assert_eq!(log.len(), 1);
    }
}
