//! Keypad entry helpers
//!
//! Fixed-point decimal entry and phone-style multi-tap text entry,
//! both written as polled state machines: feed them keys, they return
//! a result when the user finishes. Rendering goes through the display
//! trait so the machine can show entry in place on any screen.

use core::fmt::Write;

use heapless::String;

use crate::program::TEXT_LEN;
use crate::traits::{Key, TextDisplay};

/// Same key within this window cycles the character instead of
/// appending a new one
const MULTITAP_TIMEOUT_US: u32 = 500_000;

/// How a completed entry ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EntryOutcome {
    /// Fixed-point value in least-significant-digit counts
    pub value: i32,
    /// True when the user backed out with C; the value must be ignored
    pub cancelled: bool,
}

/// Fixed-precision decimal entry.
///
/// Digits shift in from the right, so entering 1-2-5 with two decimal
/// places reads 0.01, 0.12, 1.25. A is backspace, star/hash flip the
/// sign (when signed), B or D accept, C cancels.
#[derive(Debug)]
pub struct DecimalEntry {
    digits: heapless::Vec<u8, 8>,
    magnitude: u8,
    precision: u8,
    signed: bool,
    negative: bool,
    row: u8,
    col: u8,
}

impl DecimalEntry {
    pub fn new(magnitude: u8, precision: u8, signed: bool, row: u8, col: u8) -> Self {
        Self {
            digits: heapless::Vec::new(),
            magnitude,
            precision,
            signed,
            negative: false,
            row,
            col,
        }
    }

    /// Feed one key; `Some` when entry is finished
    pub fn handle(&mut self, key: Key) -> Option<EntryOutcome> {
        match key {
            Key::Digit(d) => {
                if self.digits.len() < (self.magnitude + self.precision) as usize {
                    let _ = self.digits.push(d);
                }
            }
            Key::A => {
                self.digits.pop();
            }
            Key::Star | Key::Hash => {
                if self.signed {
                    self.negative = !self.negative;
                }
            }
            Key::B | Key::D => return Some(self.finish(false)),
            Key::C => return Some(self.finish(true)),
        }
        None
    }

    fn finish(&self, cancelled: bool) -> EntryOutcome {
        let mut value: i32 = 0;
        for &d in &self.digits {
            value = value * 10 + d as i32;
        }
        if self.negative {
            value = -value;
        }
        EntryOutcome { value, cancelled }
    }

    /// Draw the value as entered so far, zero-filled to its precision
    pub fn render<D: TextDisplay>(&self, display: &mut D) {
        let mut line: String<16> = String::new();

        let int_digits = (self.digits.len() as i32 - self.precision as i32).max(0) as usize;
        for _ in int_digits.max(1)..self.magnitude as usize {
            let _ = line.push(' ');
        }
        if self.signed {
            let _ = line.push(if self.negative { '-' } else { ' ' });
        }

        if int_digits == 0 {
            let _ = line.push('0');
        }
        for &d in &self.digits[..int_digits] {
            let _ = line.push((b'0' + d) as char);
        }

        if self.precision > 0 {
            let _ = line.push('.');
            for _ in self.digits.len()..self.precision as usize {
                let _ = line.push('0');
            }
            for &d in &self.digits[int_digits..] {
                let _ = line.push((b'0' + d) as char);
            }
        }

        display.text(self.row, self.col, &line);
    }
}

/// Result of a text entry session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOutcome {
    pub text: String<TEXT_LEN>,
    pub cancelled: bool,
}

/// Multi-tap alphanumeric entry on the 16-key pad.
///
/// Digit keys cycle through their letter group when pressed repeatedly
/// within the timeout. A is backspace, star toggles letters/digits,
/// hash toggles case, B or D accept, C cancels.
#[derive(Debug)]
pub struct TextEntry {
    buf: String<TEXT_LEN>,
    alpha: bool,
    upper: bool,
    last_digit: Option<u8>,
    last_us: u32,
    cycle: usize,
    row: u8,
    col: u8,
}

/// Letter groups per digit key
const GROUPS: [&str; 10] = [
    " ", "-,.!?+/", "ABC", "DEF", "GHI", "JKL", "MNO", "PQRS", "TUV", "WXYZ",
];

impl TextEntry {
    pub fn new(row: u8, col: u8) -> Self {
        Self {
            buf: String::new(),
            alpha: true,
            upper: true,
            last_digit: None,
            last_us: 0,
            cycle: 0,
            row,
            col,
        }
    }

    /// Feed one key; `Some` when entry is finished
    pub fn handle(&mut self, key: Key, now_us: u32) -> Option<TextOutcome> {
        match key {
            Key::A => {
                self.buf.pop();
                self.last_digit = None;
            }
            Key::Star => {
                self.alpha = !self.alpha;
                self.last_digit = None;
            }
            Key::Hash => {
                self.upper = !self.upper;
            }
            Key::B | Key::D => {
                return Some(TextOutcome {
                    text: self.buf.clone(),
                    cancelled: false,
                })
            }
            Key::C => {
                return Some(TextOutcome {
                    text: self.buf.clone(),
                    cancelled: true,
                })
            }
            Key::Digit(d) => self.on_digit(d, now_us),
        }
        None
    }

    fn on_digit(&mut self, d: u8, now_us: u32) {
        if !self.alpha {
            let _ = self.buf.push((b'0' + d) as char);
            self.last_digit = None;
            return;
        }

        let group = GROUPS[d as usize].as_bytes();
        let within = now_us.wrapping_sub(self.last_us) <= MULTITAP_TIMEOUT_US;
        if within && self.last_digit == Some(d) && !self.buf.is_empty() {
            // same key again: replace the last char with the next option
            self.cycle = (self.cycle + 1) % group.len();
            self.buf.pop();
        } else {
            self.cycle = 0;
            self.last_digit = Some(d);
        }
        if self.buf.len() < TEXT_LEN {
            let c = group[self.cycle] as char;
            let _ = self
                .buf
                .push(if self.upper { c } else { c.to_ascii_lowercase() });
        }
        self.last_us = now_us;
    }

    /// Draw the text entered so far, blanking the rest of the field
    pub fn render<D: TextDisplay>(&self, display: &mut D) {
        let mut line: String<16> = String::new();
        let _ = line.push_str(&self.buf);
        while line.len() < TEXT_LEN {
            let _ = line.push(' ');
        }
        display.text(self.row, self.col, &line);
    }
}
