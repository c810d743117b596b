//! The timer's finite-state orchestrator
//!
//! Everything the user can do maps to a state: menus, editors, the run
//! screen, focus mode, slot IO, host communication and configuration.
//! Each state has an `enter` action that paints its screen and a `poll`
//! action that reacts to input; transitions go through [`Machine::change_state`],
//! which also discards input edges so a press never leaks from one
//! state into the next.

pub mod entry;

use core::fmt::Write;

use heapless::String;

use fstop_protocol::layout::Eeprom;
use fstop_protocol::link::{HostLink, SerialPort};

use crate::exec::Executor;
use crate::machine::entry::{DecimalEntry, TextEntry};
use crate::paper::{quantize_grade, Paper};
use crate::program::{Program, MAX_STOP, MIN_STOP};
use crate::settings::{Settings, BACKLIGHT_MAX, BACKLIGHT_MIN, VERSION_CODE};
use crate::traits::{Clock, Controls, Key, Lamp, RotaryDelta, TextDisplay, TextDisplayExt};

/// Product name shown on the splash screen
pub const VERSION: &str = "LED F/Stop Timer";

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Boot banner
    Splash,
    /// Top-level menu
    Main,
    /// Step editor, with the rotary nudging the selected step
    Edit,
    /// Numeric entry of a step's stops
    EditEv,
    /// Numeric entry of a step's grade
    EditGrade,
    /// Multi-tap entry of a step's description
    EditText,
    /// Run screen; exposures fire from here
    Exec,
    /// Lamp at full for composition and focusing
    Focus,
    /// Slot IO menu
    Io,
    IoLoad,
    IoSave,
    /// Host serial session
    Comms,
    /// Test strip screen
    Test,
    TestChangeBase,
    TestChangeStep,
    /// Configuration menu
    Config,
    ConfigDry,
    ConfigRotary,
}

/// Which program the run screen executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Current,
    Strip,
}

/// The whole timer, generic over its hardware
pub struct Machine<D, C, R, L, K, S, E> {
    display: D,
    controls: C,
    rotary: R,
    lamp: L,
    clock: K,
    serial: S,
    eeprom: E,

    state: State,
    prev: State,
    settings: Settings,
    paper: Paper,
    current: Program,
    strip: Program,
    exec: Executor,
    link: HostLink,

    target: Target,
    edit_step: usize,
    focus_phase: Option<usize>,
    decimal: DecimalEntry,
    text: TextEntry,
}

impl<D, C, R, L, K, S, E> Machine<D, C, R, L, K, S, E>
where
    D: TextDisplay,
    C: Controls,
    R: RotaryDelta,
    L: Lamp,
    K: Clock,
    S: SerialPort,
    E: Eeprom,
{
    pub fn new(display: D, controls: C, rotary: R, lamp: L, clock: K, serial: S, eeprom: E) -> Self {
        Self {
            display,
            controls,
            rotary,
            lamp,
            clock,
            serial,
            eeprom,
            state: State::Main,
            prev: State::Main,
            settings: Settings::default(),
            paper: Paper::default_curve(),
            current: Program::new(),
            strip: Program::new(),
            exec: Executor::new(),
            link: HostLink::new(),
            target: Target::Current,
            edit_step: 0,
            focus_phase: None,
            decimal: DecimalEntry::new(1, 2, true, 2, 0),
            text: TextEntry::new(0, 0),
        }
    }

    /// Load settings, make the outputs safe and show the splash screen
    pub fn begin(&mut self) {
        self.lamp.all_off();
        self.settings = Settings::load_or_init(&mut self.eeprom);
        self.display.set_backlight(self.settings.backlight);
        self.current.clear();
        self.change_state(State::Splash);
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn program(&self) -> &Program {
        &self.current
    }

    pub fn program_mut(&mut self) -> &mut Program {
        &mut self.current
    }

    /// The persistent storage, e.g. for flushing deferred writes from
    /// the main loop
    pub fn storage_mut(&mut self) -> &mut E {
        &mut self.eeprom
    }

    /// Service the current state; call continuously from the main loop
    pub fn poll(&mut self) {
        self.controls.poll();

        match self.state {
            State::Splash => self.splash_poll(),
            State::Main => self.main_poll(),
            State::Edit => self.edit_poll(),
            State::EditEv => self.edit_ev_poll(),
            State::EditGrade => self.edit_grade_poll(),
            State::EditText => self.edit_text_poll(),
            State::Exec => self.exec_poll(),
            State::Focus => self.focus_poll(),
            State::Io => self.io_poll(),
            State::IoLoad => self.io_load_poll(),
            State::IoSave => self.io_save_poll(),
            State::Comms => self.comms_poll(),
            State::Test => self.test_poll(),
            State::TestChangeBase => self.test_change_base_poll(),
            State::TestChangeStep => self.test_change_step_poll(),
            State::Config => self.config_poll(),
            State::ConfigDry => self.config_dry_poll(),
            State::ConfigRotary => self.config_rotary_poll(),
        }
    }

    fn change_state(&mut self, next: State) {
        self.prev = self.state;
        self.state = next;
        // a press that caused this transition must not act again
        self.controls.clear_edges();
        self.enter(next);
    }

    fn enter(&mut self, state: State) {
        match state {
            State::Splash => {
                let mut version: String<20> = String::new();
                let _ = write!(version, "Version {}.{}", VERSION_CODE / 10, VERSION_CODE % 10);
                self.display.show_notice(VERSION, &version);
            }
            State::Main => {
                self.display.clear();
                self.display.text(0, 0, "A:Edit   B:IO");
                self.display.text(1, 0, "C:Config D:Test");
                self.display.text(2, 0, "*:Focus  #:Expose");
            }
            State::Edit => {
                self.rotary.take_delta();
                self.edit_step = 0;
                self.display.show_step(self.current.step(0));
            }
            State::EditEv => {
                self.decimal = DecimalEntry::new(1, 2, true, 2, 0);
                self.display.show_step(self.current.step(self.edit_step));
                self.decimal.render(&mut self.display);
            }
            State::EditGrade => {
                self.decimal = DecimalEntry::new(3, 0, false, 1, 7);
                self.display.show_step(self.current.step(self.edit_step));
                self.decimal.render(&mut self.display);
            }
            State::EditText => {
                self.text = TextEntry::new(0, 0);
                self.display.show_step(self.current.step(self.edit_step));
                self.text.render(&mut self.display);
            }
            State::Exec => self.enter_exec(),
            State::Focus => {
                self.display.show_notice("       Focus!", "");
                self.lamp.focus_on();
            }
            State::Io => {
                self.display.clear();
                self.display.text(0, 0, "A: New  B: Load");
                self.display.text(1, 0, "C: Save D: Main");
            }
            State::IoLoad => {
                self.display.show_notice("Select Load Slot", "");
                self.decimal = DecimalEntry::new(1, 0, false, 1, 0);
                self.decimal.render(&mut self.display);
            }
            State::IoSave => {
                self.display.show_notice("Select Save Slot", "");
                self.decimal = DecimalEntry::new(1, 0, false, 1, 0);
                self.decimal.render(&mut self.display);
            }
            State::Comms => {
                let now = self.clock.now_micros();
                self.link.reset(now);
            }
            State::Test => {
                self.display.clear();
                let mut top: String<20> = String::new();
                let _ = write!(
                    top,
                    "A:{} B:Change",
                    if self.settings.strip_cover { "Cover" } else { "Indiv" }
                );
                self.display.text(0, 0, &top);

                let mut range: String<20> = String::new();
                let _ = write!(
                    range,
                    "{} by {}",
                    crate::fmt::stops(self.settings.strip_base),
                    crate::fmt::stops(self.settings.strip_step)
                );
                self.display.text(1, 0, &range);
                self.display
                    .text(2, 19, if self.settings.drydown_apply { "D" } else { " " });
                self.rotary.take_delta();
            }
            State::TestChangeBase => {
                self.display.show_notice("Test Strip Base:", "");
                self.decimal = DecimalEntry::new(1, 2, true, 1, 0);
                self.decimal.render(&mut self.display);
            }
            State::TestChangeStep => {
                self.display.show_notice("Test Strip Step:", "");
                self.decimal = DecimalEntry::new(1, 2, false, 1, 0);
                self.decimal.render(&mut self.display);
            }
            State::Config => {
                self.display.clear();
                self.display.text(0, 0, "Config  A:Rotary");
                self.display.text(1, 0, "B:Brite D:Drydn");
            }
            State::ConfigDry => {
                self.display.show_notice("Drydown Factor:", "");
                self.decimal = DecimalEntry::new(0, 2, false, 1, 0);
                self.decimal.render(&mut self.display);
            }
            State::ConfigRotary => {
                self.display.show_notice("Rotary Step:", "");
                self.decimal = DecimalEntry::new(0, 2, false, 1, 0);
                self.decimal.render(&mut self.display);
            }
        }
    }

    fn splash_poll(&mut self) {
        if self.serial.has_input() {
            self.change_state(State::Comms);
            return;
        }
        if self.controls.take_key().is_some() || self.controls.take_expose() {
            self.change_state(State::Main);
        }
    }

    fn main_poll(&mut self) {
        if self.controls.take_expose() {
            self.change_state(State::Focus);
            return;
        }
        if let Some(key) = self.controls.take_key() {
            match key {
                Key::A => self.change_state(State::Edit),
                Key::B => self.change_state(State::Io),
                Key::C => self.change_state(State::Config),
                Key::D => self.change_state(State::Test),
                Key::Hash => self.run_current(),
                Key::Star => self.change_state(State::Focus),
                _ => {}
            }
            return;
        }
        if self.serial.has_input() {
            self.change_state(State::Comms);
        }
    }

    /// Compile the working program and run it, or bounce to the editor
    /// when the dodges don't fit in the base exposure
    fn run_current(&mut self) {
        let dry = self.settings.effective_drydown();
        if self.current.compile(dry, &self.paper).is_err() {
            self.display.show_notice("Cannot Print", "Dodges > Base");
            self.clock.delay_ms(2000);
            self.change_state(State::Edit);
        } else {
            self.target = Target::Current;
            self.change_state(State::Exec);
        }
    }

    fn enter_exec(&mut self) {
        let dry = self.settings.effective_drydown();
        let compiled = match self.target {
            Target::Current => self.current.compile(dry, &self.paper).is_ok(),
            Target::Strip => {
                self.strip.configure_strip(
                    self.settings.strip_base,
                    self.settings.strip_step,
                    self.settings.strip_cover,
                    100,
                );
                self.strip.compile(dry, &self.paper).is_ok()
            }
        };
        if !compiled {
            self.display.show_notice("Cannot Print", "Dodges > Base");
            self.clock.delay_ms(2000);
            self.change_state(State::Edit);
            return;
        }

        self.exec.set_drydown(self.settings.drydown_apply);
        // returning from focus resumes mid-program
        let phase = self.focus_phase.take().unwrap_or(0);
        match self.target {
            Target::Current => self.exec.change_phase(&self.current, phase, &mut self.display),
            Target::Strip => self.exec.change_phase(&self.strip, phase, &mut self.display),
        }
    }

    fn run_exposure(&mut self) {
        match self.target {
            Target::Current => self.exec.expose(
                &self.current,
                &mut self.display,
                &mut self.controls,
                &mut self.lamp,
                &self.clock,
            ),
            Target::Strip => self.exec.expose(
                &self.strip,
                &mut self.display,
                &mut self.controls,
                &mut self.lamp,
                &self.clock,
            ),
        };
    }

    fn restart_program(&mut self) {
        match self.target {
            Target::Current => self.exec.change_phase(&self.current, 0, &mut self.display),
            Target::Strip => self.exec.change_phase(&self.strip, 0, &mut self.display),
        }
    }

    fn exec_poll(&mut self) {
        if self.controls.take_expose() {
            self.run_exposure();
            return;
        }
        if let Some(key) = self.controls.take_key() {
            match key {
                Key::Hash => self.run_exposure(),
                Key::Star => {
                    self.focus_phase = Some(self.exec.phase());
                    self.change_state(State::Focus);
                }
                Key::A => {
                    self.display.show_notice("Restart Exposure", "");
                    self.clock.delay_ms(1000);
                    self.restart_program();
                }
                Key::B => {
                    match self.target {
                        Target::Current => {
                            self.exec
                                .advance_phase(&self.current, &mut self.display, &self.clock)
                        }
                        Target::Strip => {
                            self.exec
                                .advance_phase(&self.strip, &mut self.display, &self.clock)
                        }
                    };
                }
                Key::C => self.change_state(State::Main),
                Key::D => {
                    self.toggle_drydown();
                    if self.exec.phase() != 0 {
                        self.display
                            .show_notice("Restart Exposure", "For Drydown Chg");
                        self.clock.delay_ms(1000);
                    }
                    // re-enter to recompile with the new factor
                    self.change_state(State::Exec);
                }
                Key::Digit(7) => {
                    self.toggle_split_grade();
                    if self.exec.phase() != 0 {
                        self.display
                            .show_notice("Restart Exposure", "For Splitgrade Chg");
                        self.clock.delay_ms(1000);
                    }
                    self.change_state(State::Exec);
                }
                _ => {}
            }
        }
    }

    fn focus_poll(&mut self) {
        if self.controls.take_expose() || self.controls.take_key().is_some() {
            self.lamp.all_off();
            self.change_state(self.prev);
        }
    }

    fn edit_poll(&mut self) {
        if self.controls.take_expose() {
            self.run_current();
            return;
        }
        if let Some(key) = self.controls.take_key() {
            match key {
                Key::A => self.change_state(State::EditText),
                Key::B => self.change_state(State::EditEv),
                Key::C => self.change_state(State::Main),
                Key::D => self.change_state(State::EditGrade),
                Key::Hash | Key::Star => self.run_current(),
                Key::Digit(d) if (1..=8).contains(&d) => {
                    self.edit_step = d as usize - 1;
                    self.display.show_step(self.current.step(self.edit_step));
                }
                _ => {}
            }
            return;
        }

        let moved = self.rotary.take_delta();
        if moved != 0 {
            self.current
                .step_mut(self.edit_step)
                .adjust_stops(moved * self.settings.rotary_step as i32);
            self.display.show_step(self.current.step(self.edit_step));
        }
    }

    fn edit_ev_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            if let Some(out) = self.decimal.handle(key) {
                if !out.cancelled {
                    self.current.step_mut(self.edit_step).stops =
                        out.value.clamp(MIN_STOP as i32, MAX_STOP as i32) as i16;
                }
                self.display.show_step(self.current.step(self.edit_step));
                // slip back without the enter action so the selected
                // step survives
                self.state = State::Edit;
            } else {
                self.decimal.render(&mut self.display);
            }
        }
    }

    fn edit_grade_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            if let Some(out) = self.decimal.handle(key) {
                if !out.cancelled {
                    self.current.step_mut(self.edit_step).grade =
                        quantize_grade(out.value.clamp(0, 255) as u8);
                }
                self.display.show_step(self.current.step(self.edit_step));
                self.state = State::Edit;
            } else {
                self.decimal.render(&mut self.display);
            }
        }
    }

    fn edit_text_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            let now = self.clock.now_micros();
            if let Some(out) = self.text.handle(key, now) {
                if !out.cancelled {
                    self.current.step_mut(self.edit_step).text = out.text;
                }
                self.display.show_step(self.current.step(self.edit_step));
                self.state = State::Edit;
            } else {
                self.text.render(&mut self.display);
            }
        }
    }

    fn io_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            match key {
                Key::A => {
                    self.current.clear();
                    self.change_state(State::Edit);
                }
                Key::B => self.change_state(State::IoLoad),
                Key::C => self.change_state(State::IoSave),
                Key::D => self.change_state(State::Main),
                _ => {}
            }
        }
    }

    fn io_load_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            if let Some(out) = self.decimal.handle(key) {
                if !out.cancelled {
                    let slot = out.value.clamp(0, 255) as u8;
                    if self.current.load(slot, &self.eeprom).is_ok() {
                        self.display.show_notice("Program Loaded", "");
                    } else {
                        self.display.show_notice("Slot not in 1..7", "");
                    }
                    self.clock.delay_ms(1000);
                }
                self.change_state(State::Edit);
            } else {
                self.decimal.render(&mut self.display);
            }
        }
    }

    fn io_save_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            if let Some(out) = self.decimal.handle(key) {
                if !out.cancelled {
                    let slot = out.value.clamp(0, 255) as u8;
                    if self.current.save(slot, &mut self.eeprom).is_ok() {
                        self.display.show_notice("Program Saved", "");
                    } else {
                        self.display.show_notice("Slot not in 1..7", "");
                    }
                    self.clock.delay_ms(1000);
                }
                self.change_state(State::Main);
            } else {
                self.decimal.render(&mut self.display);
            }
        }
    }

    fn comms_poll(&mut self) {
        let now = self.clock.now_micros();
        let disconnected = self.link.poll(now, &mut self.serial, &mut self.eeprom);
        if let Some(status) = self.link.take_status() {
            self.display.show_notice(status.message(), "");
        }
        if disconnected {
            self.change_state(State::Main);
        }
    }

    fn test_poll(&mut self) {
        let mut go = self.controls.take_expose();
        if let Some(key) = self.controls.take_key() {
            match key {
                Key::A => {
                    self.settings.strip_cover = !self.settings.strip_cover;
                    self.settings.save_strip(&mut self.eeprom);
                    self.change_state(State::Test);
                }
                Key::B => self.change_state(State::TestChangeBase),
                Key::C => self.change_state(State::Main),
                Key::D => {
                    self.toggle_drydown();
                    self.change_state(State::Test);
                }
                Key::Hash => go = true,
                _ => {}
            }
        }

        let moved = self.rotary.take_delta();
        if moved != 0 {
            let base = self.settings.strip_base as i32
                + moved * self.settings.rotary_step as i32;
            self.settings.strip_base = base.clamp(MIN_STOP as i32, MAX_STOP as i32) as i16;
            self.change_state(State::Test);
        }

        if go {
            self.target = Target::Strip;
            self.change_state(State::Exec);
        }
    }

    fn test_change_base_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            if let Some(out) = self.decimal.handle(key) {
                if !out.cancelled {
                    self.settings.strip_base =
                        out.value.clamp(MIN_STOP as i32, MAX_STOP as i32) as i16;
                    self.settings.save_strip(&mut self.eeprom);
                }
                self.change_state(State::TestChangeStep);
            } else {
                self.decimal.render(&mut self.display);
            }
        }
    }

    fn test_change_step_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            if let Some(out) = self.decimal.handle(key) {
                if !out.cancelled {
                    self.settings.strip_step = out.value.clamp(0, MAX_STOP as i32) as i16;
                    self.settings.save_strip(&mut self.eeprom);
                }
                self.change_state(State::Test);
            } else {
                self.decimal.render(&mut self.display);
            }
        }
    }

    fn config_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            match key {
                Key::A => self.change_state(State::ConfigRotary),
                Key::B => {
                    self.settings.backlight = if self.settings.backlight >= BACKLIGHT_MAX {
                        BACKLIGHT_MIN
                    } else {
                        self.settings.backlight + 1
                    };
                    self.settings.save_backlight(&mut self.eeprom);
                    self.display.set_backlight(self.settings.backlight);
                }
                Key::D => self.change_state(State::ConfigDry),
                _ => self.change_state(State::Main),
            }
        }
    }

    fn config_dry_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            if let Some(out) = self.decimal.handle(key) {
                if out.cancelled {
                    self.display.show_notice("Cancelled", "");
                } else {
                    self.settings.drydown = out.value.clamp(0, 255) as u8;
                    self.settings.save_drydown(&mut self.eeprom);
                    let mut line: String<20> = String::new();
                    let _ = write!(
                        line,
                        "Drydown = {}.{:02}",
                        self.settings.drydown / 100,
                        self.settings.drydown % 100
                    );
                    self.display.show_notice("Changed", &line);
                }
                self.clock.delay_ms(1000);
                self.change_state(State::Main);
            } else {
                self.decimal.render(&mut self.display);
            }
        }
    }

    fn config_rotary_poll(&mut self) {
        if let Some(key) = self.controls.take_key() {
            if let Some(out) = self.decimal.handle(key) {
                if out.cancelled {
                    self.display.show_notice("Cancelled", "");
                } else {
                    self.settings.rotary_step = out.value.clamp(0, 255) as u8;
                    self.settings.save_rotary_step(&mut self.eeprom);
                    let mut line: String<20> = String::new();
                    let _ = write!(
                        line,
                        "Step = {}.{:02}",
                        self.settings.rotary_step / 100,
                        self.settings.rotary_step % 100
                    );
                    self.display.show_notice("Changed", &line);
                }
                self.clock.delay_ms(1000);
                self.change_state(State::Main);
            } else {
                self.decimal.render(&mut self.display);
            }
        }
    }

    fn toggle_drydown(&mut self) {
        self.settings.drydown_apply = !self.settings.drydown_apply;
        self.settings.save_drydown(&mut self.eeprom);
    }

    fn toggle_split_grade(&mut self) {
        self.settings.split_grade = !self.settings.split_grade;
        self.settings.save_split_grade(&mut self.eeprom);
    }
}

#[cfg(test)]
impl<D, C, R, L, K, S, E> Machine<D, C, R, L, K, S, E> {
    pub(crate) fn display(&self) -> &D {
        &self.display
    }

    pub(crate) fn controls_mut(&mut self) -> &mut C {
        &mut self.controls
    }

    pub(crate) fn rotary_mut(&mut self) -> &mut R {
        &mut self.rotary
    }

    pub(crate) fn lamp(&self) -> &L {
        &self.lamp
    }

    pub(crate) fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    pub(crate) fn eeprom(&self) -> &E {
        &self.eeprom
    }

    pub(crate) fn exec_phase(&self) -> usize {
        self.exec.phase()
    }
}
