//! Paper contrast curves
//!
//! Variable-contrast paper is graded on the ISO exposure scale from 30
//! (softest) to 200 (hardest) in steps of 5. Each grade maps to a pair
//! of LED power levels for the hard (blue) and soft (green) channels.
//! Power is inverted: 0 is full output, 255 is off.

use heapless::String;

/// Softest supported grade
pub const MIN_GRADE: u8 = 30;
/// Hardest supported grade
pub const MAX_GRADE: u8 = 200;
/// Grades are quantized to multiples of this
pub const GRADE_STEP: u8 = 5;
/// Number of entries in a contrast curve
pub const GRADES: usize = ((MAX_GRADE - MIN_GRADE) / GRADE_STEP) as usize + 1;

/// Channel fully off
pub const POWER_OFF: u8 = 255;
/// Channel at full output
pub const POWER_FULL: u8 = 0;

/// Clamp an arbitrary grade into the supported range
pub fn clamp_grade(grade: u8) -> u8 {
    grade.clamp(MIN_GRADE, MAX_GRADE)
}

/// Quantize a grade down to a multiple of [`GRADE_STEP`], then clamp
pub fn quantize_grade(grade: u8) -> u8 {
    clamp_grade(grade / GRADE_STEP * GRADE_STEP)
}

/// A paper's contrast curve: per-grade power for each channel
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Paper {
    name: String<16>,
    soft: [u8; GRADES],
    hard: [u8; GRADES],
}

impl Default for Paper {
    fn default() -> Self {
        Self::default_curve()
    }
}

impl Paper {
    /// Built-in curve, measured against a common graded paper.
    ///
    /// The extreme grades drive a single channel only. Mid-range hard
    /// values complement the soft channel so total output stays roughly
    /// constant across grades.
    pub fn default_curve() -> Self {
        let soft: [u8; GRADES] = [
            255, 255, 255, 255, 255, 210, 184, 158, 141, 127, 118, 111, 105, 100, 95, 90, 85, 80,
            75, 71, 66, 58, 51, 45, 39, 34, 28, 22, 16, 10, 9, 8, 7, 6, 5,
        ];
        let mut hard = [POWER_OFF; GRADES];
        for i in 6..30 {
            hard[i] = 217 - soft[i];
        }
        // below the soft-only band the hard channel saturates
        for slot in hard.iter_mut().take(6) {
            *slot = POWER_FULL;
        }

        let mut name = String::new();
        let _ = name.push_str("Default Paper");
        Self { name, soft, hard }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Soft-channel power for a grade (clamped into range)
    pub fn soft_power(&self, grade: u8) -> u8 {
        self.soft[Self::index(grade)]
    }

    /// Hard-channel power for a grade (clamped into range)
    pub fn hard_power(&self, grade: u8) -> u8 {
        self.hard[Self::index(grade)]
    }

    fn index(grade: u8) -> usize {
        ((clamp_grade(grade) - MIN_GRADE) / GRADE_STEP) as usize
    }
}
