//! Hardware abstraction traits
//!
//! These traits define the interface between the application logic
//! and hardware-specific implementations.

pub mod display;
pub mod input;
pub mod lamp;
pub mod time;

pub use display::{TextDisplay, TextDisplayExt, DISPLAY_COLS, DISPLAY_ROWS};
pub use input::{Controls, Key, RotaryDelta};
pub use lamp::Lamp;
pub use time::Clock;
