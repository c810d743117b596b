//! Exposure programs
//!
//! A program is a fixed array of up to eight [`Step`]s expressed in
//! photographic stops, plus the [`Exposure`]s the compiler derives from
//! them in linear milliseconds. Step zero is the base exposure; later
//! steps are dodges (negative stops) or burns (positive stops), or test
//! strip patches when the program is configured as a strip.

pub mod compile;
pub mod slots;
pub mod step;

pub use compile::{hun_to_millis, CompileError};
pub use slots::SlotError;
pub use step::{Step, MAX_STEPS, MAX_STOP, MIN_STOP, TEXT_LEN};

use crate::paper::{Paper, POWER_OFF};

use core::fmt::Write;

/// Ceiling on any single compiled exposure, one millisecond under 1000 s
pub const MAX_EXPOSURE_MS: u32 = 999_999;

/// One compiled exposure: what the executor actually runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Exposure {
    /// Duration in milliseconds; zero marks an inert phase
    pub ms: u32,
    /// Hard-channel power (0 full, 255 off)
    pub hard_power: u8,
    /// Soft-channel power (0 full, 255 off)
    pub soft_power: u8,
    /// Index of the step this was compiled from, if any
    pub source: Option<usize>,
}

impl Exposure {
    const INERT: Exposure = Exposure {
        ms: 0,
        hard_power: POWER_OFF,
        soft_power: POWER_OFF,
        source: None,
    };
}

/// Compilation mode: a normal dodge/burn program or a test strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Normal,
    Strip { cover: bool },
}

/// A program of exposure steps and its compiled output
#[derive(Debug, Clone)]
pub struct Program {
    steps: [Step; MAX_STEPS],
    exposures: [Exposure; MAX_STEPS],
    mode: Mode,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    /// A fresh program holding only a 3-stop base exposure
    pub fn new() -> Self {
        let mut p = Self {
            steps: core::array::from_fn(|_| Step::default()),
            exposures: [Exposure::INERT; MAX_STEPS],
            mode: Mode::Normal,
        };
        p.clear();
        p
    }

    /// Reset to the default base exposure and empty adjustment steps
    pub fn clear(&mut self) {
        self.steps[0] = Step::base();
        for (i, step) in self.steps.iter_mut().enumerate().skip(1) {
            *step = Step::numbered(i);
        }
        self.mode = Mode::Normal;
        self.clear_exposures();
    }

    pub(crate) fn clear_exposures(&mut self) {
        self.exposures = [Exposure::INERT; MAX_STEPS];
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn step(&self, which: usize) -> &Step {
        &self.steps[which]
    }

    pub fn step_mut(&mut self, which: usize) -> &mut Step {
        &mut self.steps[which]
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [Step; MAX_STEPS] {
        &mut self.steps
    }

    pub fn exposure(&self, which: usize) -> &Exposure {
        &self.exposures[which]
    }

    pub(crate) fn exposure_mut(&mut self, which: usize) -> &mut Exposure {
        &mut self.exposures[which]
    }

    /// Configure as a test strip: eight patches starting at `base`
    /// stops, `step` stops apart, all at one grade.
    ///
    /// In cover mode each patch extends the total exposure to its
    /// target; individual mode times every patch from zero.
    pub fn configure_strip(&mut self, base: i16, step: i16, cover: bool, grade: u8) {
        self.mode = Mode::Strip { cover };

        let mut stops = base;
        for s in self.steps.iter_mut() {
            s.stops = stops;
            s.grade = grade;
            s.hard = true;
            s.soft = true;
            s.text.clear();
            let _ = write!(s.text, "Strip {}", crate::fmt::stops(stops));
            stops = stops.saturating_add(step);
        }
    }

    /// Convert the program from stops to linear milliseconds.
    ///
    /// `drydown` (hundredths of a stop) is subtracted from the target
    /// density to compensate for the print darkening as it dries.
    pub fn compile(&mut self, drydown: i16, paper: &Paper) -> Result<(), CompileError> {
        compile::compile(self, drydown, paper)
    }
}
