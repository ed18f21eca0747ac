//! Per-offering seat accounting.
//!
//! **Invariant**: `confirmed + held <= capacity`, always. `reserve` is the only
//! way to take a seat and refuses once the offering is full; every other
//! mutation moves or returns seats that were already counted.

use booking_core::LedgerSnapshot;
use thiserror::Error;

/// Misuse of the ledger. These indicate a bookkeeping bug in the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    /// Tried to commit or release a held seat when none is held
    #[error("no held seat to {0}")]
    NothingHeld(&'static str),
    /// Tried to release a confirmed seat when none is confirmed
    #[error("no confirmed seat to release")]
    NothingConfirmed,
    /// Tried to shrink below the seats already in use
    #[error("capacity {requested} is below the {in_use} seats in use")]
    BelowInUse {
        /// Requested capacity
        requested: u32,
        /// `confirmed + held`
        in_use: u32,
    },
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Reservation {
    /// One seat is now held
    Held,
    /// No seat was available; nothing changed
    Full,
}

/// Capacity, confirmed and held counters for one offering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityLedger {
    capacity: u32,
    confirmed: u32,
    held: u32,
}

impl CapacityLedger {
    /// Empty ledger with `capacity` seats.
    #[must_use]
    pub const fn new(capacity: u32) -> Self {
        Self {
            capacity,
            confirmed: 0,
            held: 0,
        }
    }

    /// Hold one seat if any is free.
    pub const fn reserve(&mut self) -> Reservation {
        if self.confirmed + self.held >= self.capacity {
            return Reservation::Full;
        }
        self.held += 1;
        Reservation::Held
    }

    /// Turn one held seat into a confirmed one.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NothingHeld`] if no seat is held.
    pub const fn commit_held(&mut self) -> Result<(), LedgerError> {
        if self.held == 0 {
            return Err(LedgerError::NothingHeld("commit"));
        }
        self.held -= 1;
        self.confirmed += 1;
        Ok(())
    }

    /// Return one held seat to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NothingHeld`] if no seat is held.
    pub const fn release_held(&mut self) -> Result<(), LedgerError> {
        if self.held == 0 {
            return Err(LedgerError::NothingHeld("release"));
        }
        self.held -= 1;
        Ok(())
    }

    /// Return one confirmed seat to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NothingConfirmed`] if no seat is confirmed.
    pub const fn release_confirmed(&mut self) -> Result<(), LedgerError> {
        if self.confirmed == 0 {
            return Err(LedgerError::NothingConfirmed);
        }
        self.confirmed -= 1;
        Ok(())
    }

    /// Change total capacity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::BelowInUse`] if `capacity` is smaller than the
    /// seats currently confirmed or held.
    pub const fn resize(&mut self, capacity: u32) -> Result<(), LedgerError> {
        let in_use = self.confirmed + self.held;
        if capacity < in_use {
            return Err(LedgerError::BelowInUse {
                requested: capacity,
                in_use,
            });
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Free seats.
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.capacity - self.confirmed - self.held
    }

    /// Current counters.
    #[must_use]
    pub const fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            capacity: self.capacity,
            confirmed: self.confirmed,
            held: self.held,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reserve_stops_at_capacity() {
        let mut ledger = CapacityLedger::new(2);
        assert_eq!(ledger.reserve(), Reservation::Held);
        assert_eq!(ledger.reserve(), Reservation::Held);
        assert_eq!(ledger.reserve(), Reservation::Full);

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.held, 2);
        assert_eq!(snapshot.available(), 0);
    }

    #[test]
    fn commit_moves_held_to_confirmed() {
        let mut ledger = CapacityLedger::new(1);
        assert_eq!(ledger.reserve(), Reservation::Held);
        ledger.commit_held().unwrap();

        assert_eq!(ledger.snapshot().confirmed, 1);
        assert_eq!(ledger.snapshot().held, 0);
        assert_eq!(ledger.reserve(), Reservation::Full);

        ledger.release_confirmed().unwrap();
        assert_eq!(ledger.available(), 1);
    }

    #[test]
    fn misuse_is_rejected_without_change() {
        let mut ledger = CapacityLedger::new(3);
        assert_eq!(ledger.commit_held(), Err(LedgerError::NothingHeld("commit")));
        assert_eq!(ledger.release_held(), Err(LedgerError::NothingHeld("release")));
        assert_eq!(ledger.release_confirmed(), Err(LedgerError::NothingConfirmed));
        assert_eq!(ledger.snapshot().available(), 3);
    }

    #[test]
    fn resize_refuses_to_drop_below_seats_in_use() {
        let mut ledger = CapacityLedger::new(3);
        assert_eq!(ledger.reserve(), Reservation::Held);
        assert_eq!(ledger.reserve(), Reservation::Held);

        assert_eq!(
            ledger.resize(1),
            Err(LedgerError::BelowInUse {
                requested: 1,
                in_use: 2
            })
        );
        ledger.resize(2).unwrap();
        assert_eq!(ledger.available(), 0);
        ledger.resize(5).unwrap();
        assert_eq!(ledger.available(), 3);
    }
}
