//! Simulated clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock plus a signed adjustment, in seconds.
///
/// `set_time` pins the clock to a target instant by recomputing the
/// adjustment; `increase_time` pushes it forward. Given monotonic wall time
/// and non-negative increases, `current_time` is monotonic non-decreasing.
#[derive(Debug, Default)]
pub struct SimClock {
    offset_secs: AtomicI64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn wall_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Simulated time in unix seconds.
    pub fn current_time(&self) -> u64 {
        (Self::wall_secs() + self.offset_secs.load(Ordering::SeqCst)).max(0) as u64
    }

    /// Current adjustment in seconds.
    pub fn offset(&self) -> i64 {
        self.offset_secs.load(Ordering::SeqCst)
    }

    /// Restore a previously captured adjustment (used by revert).
    pub fn set_offset(&self, offset: i64) {
        self.offset_secs.store(offset, Ordering::SeqCst);
    }

    /// Pin the clock to `target` unix seconds. Returns the new adjustment.
    pub fn set_time(&self, target: i64) -> i64 {
        let offset = target - Self::wall_secs();
        self.offset_secs.store(offset, Ordering::SeqCst);
        offset
    }

    /// Advance the clock by `secs`, clamped to non-negative.
    /// Returns the new adjustment.
    pub fn increase_time(&self, secs: i64) -> i64 {
        let secs = secs.max(0);
        self.offset_secs.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_time_pins_current_time() {
        let clock = SimClock::new();
        let target = 1_577_836_800i64;
        clock.set_time(target);
        let now = clock.current_time() as i64;
        assert!((now - target).abs() <= 1, "now={now}, target={target}");
    }

    #[test]
    fn increase_time_advances_and_clamps() {
        let clock = SimClock::new();
        let before = clock.current_time();

        clock.increase_time(100);
        assert!(clock.current_time() >= before + 100);
        assert_eq!(clock.offset(), 100);

        // negative increments are clamped to zero
        clock.increase_time(-50);
        assert_eq!(clock.offset(), 100);
    }

    #[test]
    fn offset_round_trip() {
        let clock = SimClock::new();
        clock.set_time(1_000_000_000);
        let offset = clock.offset();

        clock.increase_time(30);
        assert_eq!(clock.offset(), offset + 30);

        clock.set_offset(offset);
        assert_eq!(clock.offset(), offset);
    }
}
