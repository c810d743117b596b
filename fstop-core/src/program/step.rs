//! A single exposure step

use core::fmt::Write;

use heapless::String;

/// Steps per program; also the number of patches in a test strip.
/// Load-bearing for the slot storage layout, do not change casually.
pub const MAX_STEPS: usize = 8;

/// Step description length in characters (and bytes in storage)
pub const TEXT_LEN: usize = 11;

/// Largest legal step value, hundredths of a stop
pub const MAX_STOP: i16 = 999;
/// Smallest legal step value, hundredths of a stop
pub const MIN_STOP: i16 = -800;

/// One exposure step: a density target in stops plus contrast settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Step {
    /// Fixed-point stops, hundredths; step 0 is absolute, later steps
    /// are relative to the base
    pub stops: i16,
    /// Paper grade on the ISO exposure scale
    pub grade: u8,
    /// Light the hard channel during this step
    pub hard: bool,
    /// Light the soft channel during this step
    pub soft: bool,
    /// Free-text description shown while running
    pub text: String<TEXT_LEN>,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            stops: 0,
            grade: 100,
            hard: true,
            soft: true,
            text: String::new(),
        }
    }
}

impl Step {
    /// The default base exposure: 3.00 stops at grade 100
    pub fn base() -> Self {
        let mut s = Step {
            stops: 300,
            ..Step::default()
        };
        let _ = s.text.push_str("Base");
        s
    }

    /// An empty adjustment step labelled by position
    pub fn numbered(index: usize) -> Self {
        let mut s = Step::default();
        let _ = write!(s.text, "Step {}", index + 1);
        s
    }

    /// Add to the step value, clamping to the legal range
    pub fn adjust_stops(&mut self, delta: i32) {
        let v = self.stops as i32 + delta;
        self.stops = v.clamp(MIN_STOP as i32, MAX_STOP as i32) as i16;
    }
}
