//! Exposure execution
//!
//! The executor runs one compiled exposure at a time: light on, poll
//! for elapsed time and user input, light off. It blocks for the
//! duration of the exposure; everything it touches comes in through
//! the hardware traits, so the main loop hands control over wholesale.
//!
//! During a run the hash key or the expose button pauses: the lamp goes
//! dark and the clock stops counting until the user resumes (hash or
//! button again), skips the rest of the exposure (B) or cancels the
//! whole program (any other key).

use crate::program::{Program, MAX_STEPS};
use crate::traits::{Clock, Controls, Key, Lamp, TextDisplay, TextDisplayExt};

/// Redraw the countdown at most this often
const DISPLAY_PERIOD_US: u32 = 100_000;

/// Stop servicing the display and input when this close to the end,
/// so the final millisecond lands on time
const TIGHT_LOOP_MS: u32 = 50;

/// How an exposure run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExposureOutcome {
    /// Ran to completion
    Completed,
    /// User skipped the remainder of this exposure
    Skipped,
    /// User cancelled; the program restarts from its first phase
    Cancelled,
}

/// Runs a compiled program one phase at a time
#[derive(Debug, Default)]
pub struct Executor {
    phase: usize,
    drydown: bool,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase that will run next
    pub fn phase(&self) -> usize {
        self.phase
    }

    /// Record whether drydown is applied, for the run-screen indicator
    pub fn set_drydown(&mut self, applied: bool) {
        self.drydown = applied;
    }

    /// Jump to a phase and draw its run screen
    pub fn change_phase<D: TextDisplay>(&mut self, program: &Program, phase: usize, display: &mut D) {
        self.phase = phase;
        display.show_exposure(program, phase);
        display.text(2, 19, if self.drydown { "D" } else { " " });
    }

    /// Move to the next phase with any time in it, or wrap to the
    /// start when the program is done. Returns false on wrap.
    pub fn advance_phase<D, K>(&mut self, program: &Program, display: &mut D, clock: &K) -> bool
    where
        D: TextDisplay,
        K: Clock,
    {
        for next in self.phase + 1..MAX_STEPS {
            if program.exposure(next).ms != 0 {
                self.change_phase(program, next, display);
                return true;
            }
        }

        display.show_notice("Program Complete", "");
        clock.delay_ms(1000);
        self.change_phase(program, 0, display);
        false
    }

    /// Run the current phase to completion, blocking until the light
    /// is out again. The lamp is off on every exit path.
    pub fn expose<D, C, L, K>(
        &mut self,
        program: &Program,
        display: &mut D,
        controls: &mut C,
        lamp: &mut L,
        clock: &K,
    ) -> ExposureOutcome
    where
        D: TextDisplay,
        C: Controls,
        L: Lamp,
        K: Clock,
    {
        let expo = *program.exposure(self.phase);
        let total_ms = expo.ms;
        let stops = expo.source.map_or(0, |i| program.step(i).stops);

        let mut start = clock.now_micros();
        let mut last_update = start;
        lamp.expose_on(expo.hard_power, expo.soft_power);

        let mut outcome = ExposureOutcome::Completed;
        'run: loop {
            let now = clock.now_micros();
            let elapsed_ms = now.wrapping_sub(start) / 1000;
            if elapsed_ms >= total_ms {
                break;
            }

            // near the end, spin on the clock alone
            if total_ms - elapsed_ms <= TIGHT_LOOP_MS {
                continue;
            }

            if now.wrapping_sub(last_update) > DISPLAY_PERIOD_US {
                display.show_exposure_time(stops, total_ms - elapsed_ms);
                last_update = now;
            }

            controls.poll();
            let pressed = controls.take_expose();
            let key = controls.take_key();
            // any other key during the run is swallowed
            if !pressed && key != Some(Key::Hash) {
                continue;
            }

            // paused: dark until the user decides
            lamp.all_off();
            let pause_start = clock.now_micros();
            loop {
                controls.poll();
                if controls.take_expose() {
                    break;
                }
                match controls.take_key() {
                    None => continue,
                    Some(Key::Hash) => break,
                    Some(Key::B) => {
                        outcome = ExposureOutcome::Skipped;
                        break 'run;
                    }
                    Some(_) => {
                        outcome = ExposureOutcome::Cancelled;
                        break 'run;
                    }
                }
            }

            // resume: shift the start so paused time never counts
            start = start.wrapping_add(clock.now_micros().wrapping_sub(pause_start));
            lamp.expose_on(expo.hard_power, expo.soft_power);
        }

        lamp.all_off();

        match outcome {
            ExposureOutcome::Cancelled => {
                display.show_notice("Prog Cancelled", "");
                clock.delay_ms(1000);
                self.change_phase(program, 0, display);
            }
            _ => {
                self.advance_phase(program, display, clock);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::Paper;
    use crate::testutil::{FakeClock, FakeControls, FakeDisplay, FakeLamp, Input, LampEvent};

    /// base 3.00 stops (8000 ms) plus a one-stop burn (8000 ms)
    fn two_phase_program() -> Program {
        let mut p = Program::new();
        p.step_mut(0).stops = 300;
        p.step_mut(1).stops = 100;
        p.compile(0, &Paper::default_curve()).unwrap();
        p
    }

    fn rig() -> (Executor, FakeDisplay, FakeControls, FakeLamp) {
        (
            Executor::new(),
            FakeDisplay::new(),
            FakeControls::new(),
            FakeLamp::new(),
        )
    }

    #[test]
    fn test_runs_to_completion_on_time() {
        let p = two_phase_program();
        let (mut exec, mut disp, mut ctl, mut lamp) = rig();
        let clock = FakeClock::new(500);

        exec.change_phase(&p, 0, &mut disp);
        let t0 = clock.peek();
        let outcome = exec.expose(&p, &mut disp, &mut ctl, &mut lamp, &clock);

        assert_eq!(outcome, ExposureOutcome::Completed);
        let elapsed = clock.peek().wrapping_sub(t0);
        assert!(
            (8_000_000..8_005_000).contains(&elapsed),
            "elapsed {}",
            elapsed
        );
        // lamp lit once at the compiled powers, then extinguished
        assert_eq!(lamp.events.first(), Some(&LampEvent::Expose(122, 95)));
        assert_eq!(lamp.events.last(), Some(&LampEvent::Off));
        assert!(!lamp.lit);
        // moved on to the burn phase
        assert_eq!(exec.phase(), 1);
    }

    #[test]
    fn test_countdown_redraws_are_throttled() {
        let p = two_phase_program();
        let (mut exec, mut disp, mut ctl, mut lamp) = rig();
        let clock = FakeClock::new(500);

        exec.expose(&p, &mut disp, &mut ctl, &mut lamp, &clock);

        // 8 s at one redraw per 100 ms is ~80 updates, not 16000
        assert!(disp.text_writes < 200, "writes {}", disp.text_writes);
    }

    #[test]
    fn test_pause_and_resume() {
        let p = two_phase_program();
        let (mut exec, mut disp, mut ctl, mut lamp) = rig();
        let clock = FakeClock::new(500);

        ctl.at(100, Input::Key(Key::Hash)); // pause mid-run
        ctl.at(140, Input::Key(Key::Hash)); // resume
        let outcome = exec.expose(&p, &mut disp, &mut ctl, &mut lamp, &clock);

        assert_eq!(outcome, ExposureOutcome::Completed);
        assert_eq!(
            lamp.events.as_slice(),
            &[
                LampEvent::Expose(122, 95),
                LampEvent::Off,
                LampEvent::Expose(122, 95),
                LampEvent::Off,
            ]
        );
    }

    /// Pauses mid-run, then holds the pause until a fixed span of clock
    /// time has drained away before resuming
    struct TimedPause<'a> {
        clock: &'a FakeClock,
        polls: u32,
        pause_at: u32,
        pause_us: u32,
        paused_since: Option<u32>,
        resumed: bool,
    }

    impl Controls for TimedPause<'_> {
        fn poll(&mut self) {
            self.polls += 1;
        }

        fn take_key(&mut self) -> Option<Key> {
            if self.resumed {
                return None;
            }
            match self.paused_since {
                None if self.polls >= self.pause_at => {
                    self.paused_since = Some(self.clock.now_micros());
                    Some(Key::Hash)
                }
                Some(since) if self.clock.now_micros().wrapping_sub(since) >= self.pause_us => {
                    self.resumed = true;
                    Some(Key::Hash)
                }
                _ => None,
            }
        }

        fn take_expose(&mut self) -> bool {
            false
        }

        fn clear_edges(&mut self) {}
    }

    #[test]
    fn test_paused_time_does_not_count_as_exposure() {
        let p = two_phase_program();
        let mut exec = Executor::new();
        let mut disp = FakeDisplay::new();
        let mut lamp = FakeLamp::new();
        let clock = FakeClock::new(500);
        // pause for two full seconds of clock time mid-run
        let mut ctl = TimedPause {
            clock: &clock,
            polls: 0,
            pause_at: 100,
            pause_us: 2_000_000,
            paused_since: None,
            resumed: false,
        };

        let t0 = clock.peek();
        let outcome = exec.expose(&p, &mut disp, &mut ctl, &mut lamp, &clock);

        assert_eq!(outcome, ExposureOutcome::Completed);
        // wall time spans the 8 s exposure plus the 2 s pause; were the
        // start not shifted on resume, the run would end two seconds
        // short
        let elapsed = clock.peek().wrapping_sub(t0);
        assert!(
            (9_990_000..10_010_000).contains(&elapsed),
            "elapsed {}",
            elapsed
        );
        assert_eq!(
            lamp.events.as_slice(),
            &[
                LampEvent::Expose(122, 95),
                LampEvent::Off,
                LampEvent::Expose(122, 95),
                LampEvent::Off,
            ]
        );
    }

    #[test]
    fn test_expose_button_pauses_and_resumes() {
        let p = two_phase_program();
        let (mut exec, mut disp, mut ctl, mut lamp) = rig();
        let clock = FakeClock::new(500);

        ctl.at(100, Input::Expose);
        ctl.at(140, Input::Expose);
        let outcome = exec.expose(&p, &mut disp, &mut ctl, &mut lamp, &clock);

        assert_eq!(outcome, ExposureOutcome::Completed);
        assert_eq!(lamp.events.len(), 4);
    }

    #[test]
    fn test_skip_ends_exposure_early() {
        let p = two_phase_program();
        let (mut exec, mut disp, mut ctl, mut lamp) = rig();
        let clock = FakeClock::new(500);

        ctl.at(100, Input::Key(Key::Hash));
        ctl.at(120, Input::Key(Key::B));
        let t0 = clock.peek();
        let outcome = exec.expose(&p, &mut disp, &mut ctl, &mut lamp, &clock);

        assert_eq!(outcome, ExposureOutcome::Skipped);
        assert!(clock.peek().wrapping_sub(t0) < 1_000_000);
        assert!(!lamp.lit);
        // skip still advances to the next phase
        assert_eq!(exec.phase(), 1);
    }

    #[test]
    fn test_cancel_restarts_program() {
        let p = two_phase_program();
        let (mut exec, mut disp, mut ctl, mut lamp) = rig();
        let clock = FakeClock::new(500);

        exec.change_phase(&p, 1, &mut disp);
        ctl.at(100, Input::Key(Key::Hash));
        ctl.at(120, Input::Key(Key::C));
        let outcome = exec.expose(&p, &mut disp, &mut ctl, &mut lamp, &clock);

        assert_eq!(outcome, ExposureOutcome::Cancelled);
        // after the notice, the run screen is back at the first phase
        assert!(disp.line_contains(0, "Base"));
        assert_eq!(exec.phase(), 0);
        assert!(!lamp.lit);
    }

    #[test]
    fn test_clock_wraparound_mid_exposure() {
        let p = two_phase_program();
        let (mut exec, mut disp, mut ctl, mut lamp) = rig();
        // counter wraps about one second into the 8 s exposure
        let clock = FakeClock::starting_at(u32::MAX - 1_000_000, 500);

        let t0 = clock.peek();
        let outcome = exec.expose(&p, &mut disp, &mut ctl, &mut lamp, &clock);

        assert_eq!(outcome, ExposureOutcome::Completed);
        let elapsed = clock.peek().wrapping_sub(t0);
        assert!(
            (8_000_000..8_005_000).contains(&elapsed),
            "elapsed {}",
            elapsed
        );
    }

    #[test]
    fn test_advance_skips_inert_phases() {
        let mut p = Program::new();
        p.step_mut(0).stops = 300;
        // step 1 untouched (stops 0, inert), step 2 a burn
        p.step_mut(2).stops = 50;
        p.compile(0, &Paper::default_curve()).unwrap();

        let (mut exec, mut disp, _, _) = rig();
        let clock = FakeClock::new(500);

        assert!(exec.advance_phase(&p, &mut disp, &clock));
        assert_eq!(exec.phase(), 2);
    }

    #[test]
    fn test_advance_wraps_after_last_phase() {
        let mut p = Program::new();
        p.compile(0, &Paper::default_curve()).unwrap();

        let (mut exec, mut disp, _, _) = rig();
        let clock = FakeClock::new(500);

        assert!(!exec.advance_phase(&p, &mut disp, &clock));
        assert_eq!(exec.phase(), 0);
    }
}
