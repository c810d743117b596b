//! Wall-clock adapter over the embassy time driver

use embassy_time::{block_for, Duration, Instant};

use fstop_core::traits::Clock;

#[derive(Clone, Copy)]
pub struct WallClock;

impl Clock for WallClock {
    fn now_micros(&self) -> u32 {
        // wraps every ~71 minutes; all consumers subtract wrapping
        Instant::now().as_micros() as u32
    }

    fn delay_ms(&self, ms: u32) {
        block_for(Duration::from_millis(u64::from(ms)));
    }
}
