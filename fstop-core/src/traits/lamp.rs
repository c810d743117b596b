//! Dual-channel enlarger lamp trait

/// Driver for a two-channel (hard/soft contrast) enlarger light source.
///
/// Power values follow the paper-curve convention: 0 is full power and
/// [`crate::paper::POWER_OFF`] (255) is off. Implementations must treat
/// `all_off` as unconditionally safe to call at any time; the executor
/// calls it on every exit path.
pub trait Lamp {
    /// Light both channels at the given powers
    fn expose_on(&mut self, hard_power: u8, soft_power: u8);

    /// Full power on both channels for focusing and composition
    fn focus_on(&mut self);

    /// Extinguish both channels
    fn all_off(&mut self);
}
