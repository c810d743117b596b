//! Stops-to-milliseconds compilation
//!
//! Exposure is logarithmic: each whole stop doubles the light reaching
//! the paper. Programs are edited in stops but executed in linear time,
//! so before a run the program is compiled: the base step becomes an
//! absolute duration, burns become the extra time needed on top of the
//! base, and dodges become time carved out of the base exposure.

use crate::paper::{Paper, POWER_OFF};
use crate::program::{Mode, Program, MAX_EXPOSURE_MS, MAX_STEPS};

/// Why a program cannot be compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompileError {
    /// The dodges remove more time than the base exposure contains
    DodgeExceedsBase,
}

/// Convert hundredths of a stop to milliseconds: `1000 * 2^(h/100)`,
/// rounded to the nearest millisecond. Zero stops is one second.
pub fn hun_to_millis(hundredths: i32) -> u32 {
    libm::roundf(1000.0 * libm::exp2f(hundredths as f32 / 100.0)) as u32
}

pub(super) fn compile(prog: &mut Program, drydown: i16, paper: &Paper) -> Result<(), CompileError> {
    prog.clear_exposures();

    match prog.mode() {
        Mode::Normal => {
            if let err @ Err(_) = normal(prog, drydown, paper) {
                // leave nothing runnable behind a failed compile
                prog.clear_exposures();
                return err;
            }
        }
        Mode::Strip { cover: false } => strip_individual(prog, drydown, paper),
        Mode::Strip { cover: true } => strip_cover(prog, drydown, paper),
    }

    // cap the durations so a fat-fingered entry cannot pin the lamp on
    // for longer than the display can count
    for i in 0..MAX_STEPS {
        let e = prog.exposure_mut(i);
        if e.ms > MAX_EXPOSURE_MS {
            e.ms = MAX_EXPOSURE_MS;
        }
    }
    Ok(())
}

fn normal(prog: &mut Program, drydown: i16, paper: &Paper) -> Result<(), CompileError> {
    let base_stops = prog.step(0).stops as i32 - drydown as i32;
    let base_ms = hun_to_millis(base_stops);

    let s0 = prog.step(0).clone();
    *prog.exposure_mut(0) = super::Exposure {
        ms: base_ms,
        hard_power: channel(s0.hard, paper.hard_power(s0.grade)),
        soft_power: channel(s0.soft, paper.soft_power(s0.grade)),
        source: Some(0),
    };

    // burns become time on top of the base, dodges carve time out of it
    let mut dodge_ms: u32 = 0;
    for i in 1..MAX_STEPS {
        let step = prog.step(i).clone();
        if step.stops == 0 {
            // inert step, already cleared
            continue;
        }

        let target_ms = hun_to_millis(base_stops + step.stops as i32);
        let ms = if step.stops < 0 {
            let carved = base_ms - target_ms;
            dodge_ms += carved;
            carved
        } else {
            target_ms - base_ms
        };

        *prog.exposure_mut(i) = super::Exposure {
            ms,
            hard_power: channel(step.hard, paper.hard_power(step.grade)),
            soft_power: channel(step.soft, paper.soft_power(step.grade)),
            source: Some(i),
        };
    }

    if dodge_ms > base_ms {
        return Err(CompileError::DodgeExceedsBase);
    }
    prog.exposure_mut(0).ms = base_ms - dodge_ms;
    Ok(())
}

fn strip_individual(prog: &mut Program, drydown: i16, paper: &Paper) {
    for i in 0..MAX_STEPS {
        let step = prog.step(i).clone();
        *prog.exposure_mut(i) = super::Exposure {
            ms: hun_to_millis(step.stops as i32 - drydown as i32),
            hard_power: paper.hard_power(step.grade),
            soft_power: paper.soft_power(step.grade),
            source: Some(i),
        };
    }
}

fn strip_cover(prog: &mut Program, drydown: i16, paper: &Paper) {
    // each patch tops the running total up to its own target
    let mut so_far: u32 = 0;
    for i in 0..MAX_STEPS {
        let step = prog.step(i).clone();
        let target = hun_to_millis(step.stops as i32 - drydown as i32);
        let ms = target.saturating_sub(so_far);
        so_far += ms;
        *prog.exposure_mut(i) = super::Exposure {
            ms,
            hard_power: paper.hard_power(step.grade),
            soft_power: paper.soft_power(step.grade),
            source: Some(i),
        };
    }
}

fn channel(enabled: bool, power: u8) -> u8 {
    if enabled {
        power
    } else {
        POWER_OFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;
    use proptest::prelude::*;

    fn paper() -> Paper {
        Paper::default_curve()
    }

    #[test]
    fn test_hun_to_millis_whole_stops() {
        assert_eq!(hun_to_millis(0), 1000);
        assert_eq!(hun_to_millis(100), 2000);
        assert_eq!(hun_to_millis(300), 8000);
        assert_eq!(hun_to_millis(-100), 500);
        assert_eq!(hun_to_millis(-300), 125);
    }

    #[test]
    fn test_hun_to_millis_fractional() {
        // 2^0.5 = 1.41421...
        assert_eq!(hun_to_millis(50), 1414);
        // 2^0.25 = 1.18920...
        assert_eq!(hun_to_millis(25), 1189);
    }

    #[test]
    fn test_base_only() {
        let mut p = Program::new();
        p.compile(0, &paper()).unwrap();
        assert_eq!(p.exposure(0).ms, 8000);
        assert_eq!(p.exposure(0).source, Some(0));
        // untouched steps are inert
        for i in 1..MAX_STEPS {
            assert_eq!(p.exposure(i).ms, 0);
            assert_eq!(p.exposure(i).source, None);
        }
    }

    #[test]
    fn test_dodge_carves_time_from_base() {
        let mut p = Program::new();
        p.step_mut(0).stops = 300; // 8000 ms
        p.step_mut(1).stops = -100; // one stop down: 4000 ms target
        p.compile(0, &paper()).unwrap();

        // the dodge runs for the carved-out time and the base keeps
        // the remainder; together they sum to the original base
        assert_eq!(p.exposure(1).ms, 4000);
        assert_eq!(p.exposure(0).ms, 4000);
    }

    #[test]
    fn test_burn_is_extra_time() {
        let mut p = Program::new();
        p.step_mut(0).stops = 300;
        p.step_mut(1).stops = 100; // one stop over base: 16000 ms target
        p.compile(0, &paper()).unwrap();

        assert_eq!(p.exposure(0).ms, 8000);
        assert_eq!(p.exposure(1).ms, 8000);
    }

    #[test]
    fn test_dodge_overrun_fails() {
        let mut p = Program::new();
        p.step_mut(0).stops = 300; // 8000 ms
        p.step_mut(1).stops = -200; // carves 6000
        p.step_mut(2).stops = -200; // carves 6000 more
        assert_eq!(p.compile(0, &paper()), Err(CompileError::DodgeExceedsBase));
        // failed compile leaves no runnable exposures
        for i in 0..MAX_STEPS {
            assert_eq!(p.exposure(i).ms, 0);
        }
    }

    #[test]
    fn test_drydown_reduces_base() {
        let mut p = Program::new();
        p.step_mut(0).stops = 300;
        p.compile(100, &paper()).unwrap();
        assert_eq!(p.exposure(0).ms, 4000);
    }

    #[test]
    fn test_ceiling() {
        let mut p = Program::new();
        p.step_mut(0).stops = 999;
        p.compile(0, &paper()).unwrap();
        assert_eq!(p.exposure(0).ms, MAX_EXPOSURE_MS);
    }

    #[test]
    fn test_disabled_channels_are_off() {
        let mut p = Program::new();
        p.step_mut(0).hard = false;
        p.compile(0, &paper()).unwrap();
        assert_eq!(p.exposure(0).hard_power, POWER_OFF);
        assert_ne!(p.exposure(0).soft_power, POWER_OFF);
    }

    #[test]
    fn test_strip_individual_times_from_zero() {
        let mut p = Program::new();
        p.configure_strip(200, 100, false, 100);
        p.compile(0, &paper()).unwrap();

        assert_eq!(p.exposure(0).ms, 4000);
        assert_eq!(p.exposure(1).ms, 8000);
        assert_eq!(p.exposure(2).ms, 16000);
    }

    #[test]
    fn test_strip_cover_sums_to_target() {
        let mut p = Program::new();
        p.configure_strip(200, 100, true, 100);
        p.compile(0, &paper()).unwrap();

        // cumulative times equal the individual-strip targets
        let mut total = 0u32;
        for i in 0..4 {
            total += p.exposure(i).ms;
            assert_eq!(total, hun_to_millis(200 + 100 * i as i32), "patch {}", i);
        }
        // first patch runs the full base time on its own
        assert_eq!(p.exposure(0).ms, 4000);
        assert_eq!(p.exposure(1).ms, 4000);
        assert_eq!(p.exposure(2).ms, 8000);
    }

    #[test]
    fn test_strip_applies_drydown() {
        let mut p = Program::new();
        p.configure_strip(300, 50, false, 100);
        p.compile(100, &paper()).unwrap();
        assert_eq!(p.exposure(0).ms, 4000);
    }

    #[test]
    fn test_strip_patch_labels() {
        let mut p = Program::new();
        p.configure_strip(-50, 25, false, 100);
        assert_eq!(p.step(0).text.as_str(), "Strip -0.50");
        assert_eq!(p.step(1).text.as_str(), "Strip -0.25");
        assert_eq!(p.step(2).text.as_str(), "Strip +0.00");
    }

    proptest! {
        /// More stops never means less time, anywhere in the range the
        /// editors can enter
        #[test]
        fn test_hun_to_millis_monotonic(a in -800i32..=999, b in -800i32..=999) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(hun_to_millis(lo) <= hun_to_millis(hi));
        }

        /// A dodged program redistributes the base time without ever
        /// changing the total
        #[test]
        fn test_dodge_preserves_total_time(base in 200i32..=500, dodge in -150i32..=-1) {
            let mut p = Program::new();
            p.step_mut(0).stops = base as i16;
            p.step_mut(1).stops = dodge as i16;
            p.compile(0, &paper()).unwrap();

            prop_assert_eq!(
                p.exposure(0).ms + p.exposure(1).ms,
                hun_to_millis(base)
            );
        }
    }
}
