//! FIFO waitlist for one offering.
//!
//! Entries are ordered by the per-offering arrival sequence. The engine assigns
//! sequences under the offering lock, so the queue is always appended in
//! increasing order and a plain `VecDeque` is enough.

use booking_core::BookingId;
use std::collections::VecDeque;

/// A booking waiting for a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitlistEntry {
    /// Waiting booking
    pub booking: BookingId,
    /// Arrival sequence on the offering
    pub sequence: u64,
}

/// Bookings waiting for a seat, head first.
#[derive(Debug, Clone, Default)]
pub struct WaitlistQueue {
    entries: VecDeque<WaitlistEntry>,
}

impl WaitlistQueue {
    /// Empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append at the tail and return the 1-indexed position.
    pub fn enqueue(&mut self, booking: BookingId, sequence: u64) -> usize {
        debug_assert!(
            self.entries.back().is_none_or(|tail| tail.sequence < sequence),
            "waitlist sequence must increase"
        );
        self.entries.push_back(WaitlistEntry { booking, sequence });
        self.entries.len()
    }

    /// The entry that would be dequeued next.
    #[must_use]
    pub fn head(&self) -> Option<&WaitlistEntry> {
        self.entries.front()
    }

    /// Remove and return the head.
    pub fn dequeue_head(&mut self) -> Option<WaitlistEntry> {
        self.entries.pop_front()
    }

    /// Remove `booking` wherever it sits. Returns whether it was queued.
    pub fn remove(&mut self, booking: BookingId) -> bool {
        match self.entries.iter().position(|entry| entry.booking == booking) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// 1-indexed position of `booking`.
    #[must_use]
    pub fn position_of(&self, booking: BookingId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.booking == booking)
            .map(|index| index + 1)
    }

    /// Number of waiting bookings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries head first.
    pub fn iter(&self) -> impl Iterator<Item = &WaitlistEntry> {
        self.entries.iter()
    }
}
