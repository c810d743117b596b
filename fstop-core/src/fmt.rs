//! Fixed-point rendering helpers for the 20x4 character display

use core::fmt::Write;

use heapless::String;

/// Render hundredths of a stop as a signed decimal, e.g. `+3.00`, `-0.50`
pub fn stops(hundredths: i16) -> String<8> {
    let mut s = String::new();
    let sign = if hundredths < 0 { '-' } else { '+' };
    let abs = (hundredths as i32).unsigned_abs();
    let _ = write!(s, "{}{}.{:02}", sign, abs / 100, abs % 100);
    s
}

/// Render milliseconds as seconds with millisecond precision, e.g. `8.000`
pub fn seconds(ms: u32) -> String<12> {
    let mut s = String::new();
    let _ = write!(s, "{}.{:03}", ms / 1000, ms % 1000);
    s
}
