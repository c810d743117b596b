//! User input traits: keypad, expose button, rotary encoder

/// A decoded keypad press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Key {
    /// Digit keys 0-9
    Digit(u8),
    A,
    B,
    C,
    D,
    Star,
    Hash,
}

/// Keypad plus the dedicated expose button(s).
///
/// `poll` samples the hardware; presses are latched until taken, so a
/// key is never lost between polls but is reported exactly once. The
/// expose button and a footswitch, if fitted, are indistinguishable to
/// the application and are folded into one latch.
pub trait Controls {
    /// Sample the hardware; called once per main-loop iteration and
    /// from the executor's tight polling loop
    fn poll(&mut self);

    /// Take the latched keypad press, if any
    fn take_key(&mut self) -> Option<Key>;

    /// Take the latched expose button/footswitch press
    fn take_expose(&mut self) -> bool;

    /// Discard latched presses, e.g. when they could leak into a
    /// freshly entered state
    fn clear_edges(&mut self);
}

/// Source of accumulated rotary encoder movement
pub trait RotaryDelta {
    /// Detents moved since the last call; positive is clockwise
    fn take_delta(&mut self) -> i32;
}
