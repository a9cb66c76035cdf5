//! Fixed-width time bucket arithmetic
//!
//! The planner and the capacity ledger share the same bucketing: slot `i`
//! covers `[i * width, (i + 1) * width)` measured from the Unix epoch.

use chrono::{DateTime, Utc};

/// Converts between wall-clock times and slot indices for one bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClock {
    slot_minutes: u32,
}

impl SlotClock {
    /// Create a clock with the given bucket width. Widths below one
    /// minute are clamped up to one minute.
    pub fn new(slot_minutes: u32) -> Self {
        Self {
            slot_minutes: slot_minutes.max(1),
        }
    }

    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    pub fn slot_seconds(&self) -> i64 {
        self.slot_minutes as i64 * 60
    }

    pub fn slot_hours(&self) -> f64 {
        self.slot_minutes as f64 / 60.0
    }

    /// Index of the slot containing `t`.
    pub fn index_of(&self, t: DateTime<Utc>) -> i64 {
        t.timestamp().div_euclid(self.slot_seconds())
    }

    /// Start of slot `index`.
    pub fn start_of(&self, index: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(index * self.slot_seconds(), 0)
            .expect("slot index within representable time range")
    }

    /// Exclusive end of slot `index`.
    pub fn end_of(&self, index: i64) -> DateTime<Utc> {
        self.start_of(index + 1)
    }
}

impl Default for SlotClock {
    fn default() -> Self {
        Self::new(15)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn index_and_start_round_trip() {
        let clock = SlotClock::new(15);
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 10, 7, 30).unwrap();
        let idx = clock.index_of(t);
        let start = clock.start_of(idx);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
        assert_eq!(clock.end_of(idx), Utc.with_ymd_and_hms(2025, 6, 1, 10, 15, 0).unwrap());
    }

    #[test]
    fn slot_boundary_belongs_to_next_slot() {
        let clock = SlotClock::new(15);
        let boundary = Utc.with_ymd_and_hms(2025, 6, 1, 10, 15, 0).unwrap();
        assert_eq!(clock.start_of(clock.index_of(boundary)), boundary);
    }

    #[test]
    fn consecutive_slots_are_contiguous() {
        let clock = SlotClock::new(30);
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let idx = clock.index_of(t);
        assert_eq!(clock.end_of(idx), clock.start_of(idx + 1));
    }

    #[test]
    fn zero_width_is_clamped() {
        assert_eq!(SlotClock::new(0).slot_minutes(), 1);
    }
}
