//! Interval timer over a wrapping millisecond counter
//!
//! The device clock is read as a `u32` of milliseconds since boot, which
//! wraps after roughly 49.7 days. Elapsed time is always computed with
//! wrapping subtraction, so an interval spanning the wrap is still measured
//! correctly.

/// Milliseconds elapsed from `since` to `now`, across a counter wrap.
#[inline]
pub const fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishTimer {
    interval_ms: u32,
    last_ms: u32,
}

impl PublishTimer {
    /// A timer whose first period starts at boot (counter value 0).
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: 0,
        }
    }

    pub const fn is_due(&self, now_ms: u32) -> bool {
        elapsed_ms(now_ms, self.last_ms) >= self.interval_ms
    }

    /// Start a new period at `now_ms`.
    pub fn mark(&mut self, now_ms: u32) {
        self.last_ms = now_ms;
    }

    /// Mark and report whether the period had elapsed.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if self.is_due(now_ms) {
            self.mark(now_ms);
            true
        } else {
            false
        }
    }
}
