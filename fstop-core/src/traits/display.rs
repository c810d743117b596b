//! Character display trait and shared screen-drawing helpers

use core::fmt::Write;

use heapless::String;

use crate::fmt;
use crate::program::{Program, Step};

/// Columns on the character display
pub const DISPLAY_COLS: u8 = 20;
/// Rows on the character display
pub const DISPLAY_ROWS: u8 = 4;

/// A 20x4 character display.
///
/// Writes are fire-and-forget; a display that has fallen off the bus
/// must not take the timer down with it, so implementations swallow
/// their bus errors.
pub trait TextDisplay {
    /// Blank the entire screen
    fn clear(&mut self);

    /// Write text starting at a position; excess is clipped at the edge
    fn text(&mut self, row: u8, col: u8, text: &str);

    /// Set the backlight level, 0 (dim) to 8 (full)
    fn set_backlight(&mut self, level: u8) {
        let _ = level;
    }
}

/// Screen layouts shared between the editor and the executor
pub trait TextDisplayExt: TextDisplay {
    /// Step editing screen: description, grade/channels, stops
    fn show_step(&mut self, step: &Step) {
        self.clear();
        self.text(0, 0, &step.text);

        let mut line: String<20> = String::new();
        let _ = write!(
            line,
            "Grade: {} {}{}",
            step.grade,
            if step.hard { "H/" } else { "_/" },
            if step.soft { "S" } else { "_" },
        );
        self.text(1, 0, &line);
        self.text(2, 0, &fmt::stops(step.stops));
    }

    /// Run screen for one compiled exposure: description, grade and
    /// channel powers, stops with linear time
    fn show_exposure(&mut self, program: &Program, phase: usize) {
        let expo = program.exposure(phase);
        self.clear();

        if let Some(idx) = expo.source {
            let step = program.step(idx);
            self.text(0, 0, &step.text);

            let mut line: String<20> = String::new();
            let _ = write!(
                line,
                "Grade: {} {}:{}",
                step.grade, expo.soft_power, expo.hard_power
            );
            self.text(1, 0, &line);
            self.show_exposure_time(step.stops, expo.ms);
        }
    }

    /// Redraw only the time row, e.g. as the remaining time counts
    /// down. Pads to column 18 so stale digits are erased; column 19
    /// is reserved for the drydown indicator.
    fn show_exposure_time(&mut self, stops: i16, ms: u32) {
        let mut line: String<20> = String::new();
        let _ = write!(line, "{}={}s", fmt::stops(stops), fmt::seconds(ms));
        while line.len() < 19 {
            let _ = line.push(' ');
        }
        self.text(2, 0, &line);
    }

    /// Clear the screen and show up to two lines of text
    fn show_notice(&mut self, top: &str, bottom: &str) {
        self.clear();
        self.text(0, 0, top);
        if !bottom.is_empty() {
            self.text(1, 0, bottom);
        }
    }
}

impl<T: TextDisplay + ?Sized> TextDisplayExt for T {}
