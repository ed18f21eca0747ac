//! Engine configuration.
//!
//! Loads from environment variables with sensible defaults. A variable that is
//! unset uses its default; one that is set but unparsable is an error rather
//! than being silently ignored.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Offer confirmation window (24 hours).
pub const DEFAULT_OFFER_TTL_SECS: u64 = 86_400;
/// Sweep period.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
/// How long idempotency records are kept (7 days).
pub const DEFAULT_IDEMPOTENCY_RETENTION_SECS: u64 = 604_800;
/// Largest accepted batch.
pub const DEFAULT_MAX_BATCH_ROWS: usize = 500;
/// Longest wait for one payment gate answer, in milliseconds.
pub const DEFAULT_PAYMENT_TIMEOUT_MS: u64 = 30_000;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable present but not a valid value
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },
    /// Value parsed but is outside the accepted range
    #[error("{key} must be greater than zero")]
    Zero {
        /// Variable name
        key: &'static str,
    },
}

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds a promoted booking has to confirm (`BOOKING_OFFER_TTL_SECS`)
    pub offer_ttl_secs: u64,
    /// Seconds between expiry sweeps (`BOOKING_SWEEP_INTERVAL_SECS`)
    pub sweep_interval_secs: u64,
    /// Seconds idempotency records are retained (`BOOKING_IDEMPOTENCY_RETENTION_SECS`)
    pub idempotency_retention_secs: u64,
    /// Maximum rows per batch (`BOOKING_MAX_BATCH_ROWS`)
    pub max_batch_rows: usize,
    /// Milliseconds to wait for the payment gate (`BOOKING_PAYMENT_TIMEOUT_MS`)
    pub payment_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            offer_ttl_secs: DEFAULT_OFFER_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            idempotency_retention_secs: DEFAULT_IDEMPOTENCY_RETENTION_SECS,
            max_batch_rows: DEFAULT_MAX_BATCH_ROWS,
            payment_timeout_ms: DEFAULT_PAYMENT_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            offer_ttl_secs: positive(&lookup, "BOOKING_OFFER_TTL_SECS", DEFAULT_OFFER_TTL_SECS)?,
            sweep_interval_secs: positive(
                &lookup,
                "BOOKING_SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )?,
            idempotency_retention_secs: positive(
                &lookup,
                "BOOKING_IDEMPOTENCY_RETENTION_SECS",
                DEFAULT_IDEMPOTENCY_RETENTION_SECS,
            )?,
            max_batch_rows: positive(&lookup, "BOOKING_MAX_BATCH_ROWS", DEFAULT_MAX_BATCH_ROWS)?,
            payment_timeout_ms: positive(
                &lookup,
                "BOOKING_PAYMENT_TIMEOUT_MS",
                DEFAULT_PAYMENT_TIMEOUT_MS,
            )?,
        })
    }

    /// Offer confirmation window.
    #[must_use]
    pub fn offer_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.offer_ttl_secs).unwrap_or(i64::MAX))
    }

    /// Sweep period.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Deadline for a single payment gate call.
    #[must_use]
    pub const fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }

    /// Idempotency record retention.
    #[must_use]
    pub fn idempotency_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(
            i64::try_from(self.idempotency_retention_secs).unwrap_or(i64::MAX),
        )
    }
}

fn positive<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: T = raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.clone(),
    })?;
    if value == T::default() {
        return Err(ConfigError::Zero { key });
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.offer_ttl(), chrono::Duration::hours(24));
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("BOOKING_OFFER_TTL_SECS", "3600"),
            ("BOOKING_MAX_BATCH_ROWS", " 25 "),
            ("BOOKING_PAYMENT_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        assert_eq!(config.payment_timeout(), Duration::from_millis(1500));
        assert_eq!(config.offer_ttl_secs, 3600);
        assert_eq!(config.max_batch_rows, 25);
        assert_eq!(config.idempotency_retention_secs, DEFAULT_IDEMPOTENCY_RETENTION_SECS);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[("BOOKING_SWEEP_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "BOOKING_SWEEP_INTERVAL_SECS",
                value: "soon".to_string()
            }
        );

        let err = EngineConfig::from_lookup(lookup(&[("BOOKING_MAX_BATCH_ROWS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Zero { key: "BOOKING_MAX_BATCH_ROWS" });
    }
}
