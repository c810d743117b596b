//! Rotary encoder quadrature decoding
//!
//! The decoder itself is a pure state machine so it can run anywhere
//! (interrupt handler, async task, test); the [`DeltaAccumulator`] is
//! the lock-free cell that carries accumulated detents from wherever
//! the decoder runs into the main loop.

use portable_atomic::{AtomicI32, Ordering};

use crate::traits::RotaryDelta;

/// Detent-to-detent quadrature decoder.
///
/// Detents sit where both channels read equal (00 and 11). Direction is
/// taken from the transitions between detents; a bounce that returns to
/// the same detent contributes nothing.
#[derive(Debug)]
pub struct Quadrature {
    last_state: u8,
    last_detent: u8,
    trans: i8,
}

impl Quadrature {
    /// Start from the current pin levels
    pub fn new(a: bool, b: bool) -> Self {
        let state = pack(a, b);
        Self {
            last_state: state,
            last_detent: state,
            trans: 0,
        }
    }

    /// Feed the current pin levels; returns -1, 0 or +1 detents
    pub fn update(&mut self, a: bool, b: bool) -> i32 {
        let state = pack(a, b);
        if state == self.last_state {
            return 0;
        }

        let mut moved = 0;
        if a == b {
            // arrived in a detent; count it only if it differs from the
            // one we left (otherwise it was a bounce)
            if state != self.last_detent {
                moved = self.trans as i32;
            }
            self.last_detent = state;
            self.trans = 0;
        } else {
            // between detents: one channel flipped; which one encodes
            // the direction of travel
            self.trans = ((((state ^ self.last_state) & 1) << 1) as i8) - 1;
        }

        self.last_state = state;
        moved
    }
}

fn pack(a: bool, b: bool) -> u8 {
    ((b as u8) << 1) | (a as u8)
}

/// Shared accumulator between the decoder and the consumer.
///
/// Single producer, single consumer; reads clear the count so motion is
/// reported exactly once.
#[derive(Debug)]
pub struct DeltaAccumulator(AtomicI32);

impl DeltaAccumulator {
    pub const fn new() -> Self {
        Self(AtomicI32::new(0))
    }

    /// Record decoded motion (producer side)
    pub fn add(&self, detents: i32) {
        if detents != 0 {
            self.0.fetch_add(detents, Ordering::Relaxed);
        }
    }

    /// Take and clear the accumulated motion (consumer side)
    pub fn take(&self) -> i32 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

impl Default for DeltaAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl RotaryDelta for &DeltaAccumulator {
    fn take_delta(&mut self) -> i32 {
        self.take()
    }
}
