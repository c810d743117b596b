//! Shared in-memory device fakes for unit tests

use core::cell::Cell;

use heapless::{Deque, String, Vec};

use fstop_protocol::link::SerialPort;

use crate::traits::{Clock, Controls, Key, Lamp, RotaryDelta, TextDisplay};

/// Deterministic clock that advances a fixed amount per reading
pub struct FakeClock {
    now: Cell<u32>,
    step: u32,
}

impl FakeClock {
    pub fn new(step_us: u32) -> Self {
        Self::starting_at(0, step_us)
    }

    pub fn starting_at(t0: u32, step_us: u32) -> Self {
        Self {
            now: Cell::new(t0),
            step: step_us,
        }
    }

    /// Current value without advancing
    pub fn peek(&self) -> u32 {
        self.now.get()
    }
}

impl Clock for FakeClock {
    fn now_micros(&self) -> u32 {
        let t = self.now.get();
        self.now.set(t.wrapping_add(self.step));
        t
    }
}

/// 20x4 display backed by a character grid
pub struct FakeDisplay {
    rows: [[u8; 20]; 4],
    pub clears: u32,
    pub text_writes: u32,
    pub backlight: Option<u8>,
}

impl FakeDisplay {
    pub fn new() -> Self {
        Self {
            rows: [[b' '; 20]; 4],
            clears: 0,
            text_writes: 0,
            backlight: None,
        }
    }

    /// A row's content with trailing spaces stripped
    pub fn line(&self, row: usize) -> String<20> {
        let mut s: String<20> = String::new();
        let bytes = &self.rows[row];
        let end = bytes.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1);
        for &b in &bytes[..end] {
            let _ = s.push(b as char);
        }
        s
    }

    pub fn line_contains(&self, row: usize, needle: &str) -> bool {
        let line = self.line(row);
        line.as_str().contains(needle)
    }
}

impl TextDisplay for FakeDisplay {
    fn clear(&mut self) {
        self.rows = [[b' '; 20]; 4];
        self.clears += 1;
    }

    fn text(&mut self, row: u8, col: u8, text: &str) {
        self.text_writes += 1;
        let row = row as usize % 4;
        let mut col = col as usize;
        for &b in text.as_bytes() {
            if col >= 20 {
                break;
            }
            self.rows[row][col] = b;
            col += 1;
        }
    }

    fn set_backlight(&mut self, level: u8) {
        self.backlight = Some(level);
    }
}

/// A scripted input event
#[derive(Debug, Clone, Copy)]
pub enum Input {
    Key(Key),
    Expose,
}

/// Keypad/button fake: events latch immediately via `push_key`, or on a
/// given poll count via `at` for exercising the executor's run loop
pub struct FakeControls {
    script: Deque<(u32, Input), 16>,
    pub polls: u32,
    key: Option<Key>,
    expose: bool,
}

impl FakeControls {
    pub fn new() -> Self {
        Self {
            script: Deque::new(),
            polls: 0,
            key: None,
            expose: false,
        }
    }

    /// Latch a key right now
    pub fn push_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    /// Latch an expose press right now
    pub fn press_expose(&mut self) {
        self.expose = true;
    }

    /// Schedule an event to latch on the nth call to `poll`
    pub fn at(&mut self, poll: u32, input: Input) {
        self.script.push_back((poll, input)).unwrap();
    }
}

impl Controls for FakeControls {
    fn poll(&mut self) {
        self.polls += 1;
        while let Some(&(due, input)) = self.script.front() {
            if due > self.polls {
                break;
            }
            self.script.pop_front();
            match input {
                Input::Key(k) => self.key = Some(k),
                Input::Expose => self.expose = true,
            }
        }
    }

    fn take_key(&mut self) -> Option<Key> {
        self.key.take()
    }

    fn take_expose(&mut self) -> bool {
        core::mem::take(&mut self.expose)
    }

    fn clear_edges(&mut self) {
        self.key = None;
        self.expose = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LampEvent {
    Expose(u8, u8),
    Focus,
    Off,
}

/// Lamp fake recording every switch
pub struct FakeLamp {
    pub events: Vec<LampEvent, 32>,
    pub lit: bool,
}

impl FakeLamp {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            lit: false,
        }
    }
}

impl Lamp for FakeLamp {
    fn expose_on(&mut self, hard_power: u8, soft_power: u8) {
        let _ = self.events.push(LampEvent::Expose(hard_power, soft_power));
        self.lit = true;
    }

    fn focus_on(&mut self) {
        let _ = self.events.push(LampEvent::Focus);
        self.lit = true;
    }

    fn all_off(&mut self) {
        let _ = self.events.push(LampEvent::Off);
        self.lit = false;
    }
}

/// Rotary fake: set `delta`, consumed on read
pub struct FakeRotary {
    pub delta: i32,
}

impl FakeRotary {
    pub fn new() -> Self {
        Self { delta: 0 }
    }
}

impl RotaryDelta for FakeRotary {
    fn take_delta(&mut self) -> i32 {
        core::mem::take(&mut self.delta)
    }
}

/// Loopback-style serial fake
pub struct FakeSerial {
    rx: Deque<u8, 64>,
    pub tx: Vec<u8, 64>,
}

impl FakeSerial {
    pub fn new() -> Self {
        Self {
            rx: Deque::new(),
            tx: Vec::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.rx.push_back(b).unwrap();
        }
    }
}

impl SerialPort for FakeSerial {
    fn has_input(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn read(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write(&mut self, byte: u8) {
        let _ = self.tx.push(byte);
    }
}
