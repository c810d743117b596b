//! Board support for the RP2040 reference hardware
//!
//! Thin adapters from the timer's hardware traits onto concrete
//! peripherals: a dual-channel PWM lamp driver, an HD44780 character
//! display, a matrix keypad with a footswitch, a flash-backed settings
//! image and the buffered host UART.

mod display;
mod input;
mod lamp;
mod serial;
mod storage;
mod time;

pub use display::Lcd;
pub use input::Keypad;
pub use lamp::PwmLamp;
pub use serial::HostSerial;
pub use storage::FlashEeprom;
pub use time::WallClock;
