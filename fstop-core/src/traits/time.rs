//! Microsecond clock trait

/// Free-running microsecond clock.
///
/// The counter wraps at `u32::MAX` (about 71 minutes); all consumers
/// measure elapsed time with `wrapping_sub`, so the wrap is harmless as
/// long as no single interval exceeds half the counter range.
pub trait Clock {
    /// Current counter value in microseconds
    fn now_micros(&self) -> u32;

    /// Busy-wait for a number of milliseconds
    fn delay_ms(&self, ms: u32) {
        let start = self.now_micros();
        let target = ms.saturating_mul(1000);
        while self.now_micros().wrapping_sub(start) < target {}
    }
}
