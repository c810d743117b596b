//! Board-agnostic core logic for the f-stop enlarger timer
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (display, input, lamp, clock)
//! - Paper contrast curves (grade to LED power lookup)
//! - Exposure programs and the stops-to-milliseconds compiler
//! - The pausable exposure executor
//! - The menu/edit/run state machine
//! - Rotary encoder quadrature decoding
//! - Persistent settings

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod encoder;
pub mod exec;
pub mod fmt;
pub mod machine;
pub mod paper;
pub mod program;
pub mod settings;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;
