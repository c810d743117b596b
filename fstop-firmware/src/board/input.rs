//! Matrix keypad and exposure footswitch
//!
//! A 4x4 keypad scanned row by row, plus a dedicated expose button on
//! its own (active-low) input. Both are debounced by requiring a few
//! consecutive identical scans before a change is believed; presses
//! latch as edges the menu code drains with the `take_` methods.

use embassy_rp::gpio::{Input, Output};

use fstop_core::traits::{Controls, Key};

/// Consecutive identical scans before a contact change is accepted
const DEBOUNCE_POLLS: u8 = 3;

/// Physical key layout, row by row
const KEYMAP: [[Key; 4]; 4] = [
    [Key::Digit(1), Key::Digit(2), Key::Digit(3), Key::A],
    [Key::Digit(4), Key::Digit(5), Key::Digit(6), Key::B],
    [Key::Digit(7), Key::Digit(8), Key::Digit(9), Key::C],
    [Key::Star, Key::Digit(0), Key::Hash, Key::D],
];

pub struct Keypad {
    rows: [Output<'static>; 4],
    cols: [Input<'static>; 4],
    button: Input<'static>,

    key_candidate: Option<Key>,
    key_settle: u8,
    key_stable: Option<Key>,

    button_candidate: bool,
    button_settle: u8,
    button_stable: bool,

    key_event: Option<Key>,
    expose_event: bool,
}

impl Keypad {
    /// Rows are driven high one at a time; columns read back through
    /// pull-downs. The button input is expected to idle high.
    pub fn new(rows: [Output<'static>; 4], cols: [Input<'static>; 4], button: Input<'static>) -> Self {
        Self {
            rows,
            cols,
            button,
            key_candidate: None,
            key_settle: 0,
            key_stable: None,
            button_candidate: false,
            button_settle: 0,
            button_stable: false,
            key_event: None,
            expose_event: false,
        }
    }

    /// One pass over the matrix; first contact wins
    fn scan(&mut self) -> Option<Key> {
        let mut hit = None;
        for (r, row) in self.rows.iter_mut().enumerate() {
            row.set_high();
            // let the line charge before sampling
            cortex_m::asm::delay(100);
            for (c, col) in self.cols.iter().enumerate() {
                if col.is_high() && hit.is_none() {
                    hit = Some(KEYMAP[r][c]);
                }
            }
            row.set_low();
        }
        hit
    }
}

impl Controls for Keypad {
    fn poll(&mut self) {
        let raw = self.scan();
        if raw == self.key_candidate {
            if self.key_settle < DEBOUNCE_POLLS {
                self.key_settle += 1;
                if self.key_settle == DEBOUNCE_POLLS && self.key_candidate != self.key_stable {
                    self.key_stable = self.key_candidate;
                    if let Some(key) = self.key_stable {
                        self.key_event = Some(key);
                    }
                }
            }
        } else {
            self.key_candidate = raw;
            self.key_settle = 0;
        }

        let pressed = self.button.is_low();
        if pressed == self.button_candidate {
            if self.button_settle < DEBOUNCE_POLLS {
                self.button_settle += 1;
                if self.button_settle == DEBOUNCE_POLLS && self.button_candidate != self.button_stable
                {
                    self.button_stable = self.button_candidate;
                    if self.button_stable {
                        self.expose_event = true;
                    }
                }
            }
        } else {
            self.button_candidate = pressed;
            self.button_settle = 0;
        }
    }

    fn take_key(&mut self) -> Option<Key> {
        self.key_event.take()
    }

    fn take_expose(&mut self) -> bool {
        core::mem::take(&mut self.expose_event)
    }

    fn clear_edges(&mut self) {
        self.key_event = None;
        self.expose_event = false;
    }
}
