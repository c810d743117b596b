//! Host communication protocol for the f-stop enlarger timer
//!
//! This crate defines the binary serial protocol between the timer and a
//! host computer, plus the persistent-storage address map both sides (and
//! the timer's own UI) must agree on.
//!
//! # Protocol Overview
//!
//! Requests and replies use a simple binary frame format:
//! ```text
//! ┌────────┬────────┬──────────┬─────────┬──────────┐
//! │ OPCODE │ LENGTH │ ADDRESS  │ PAYLOAD │ CHECKSUM │
//! │ 1B     │ 1B     │ 2B (BE)  │ 0–64B   │ 1B       │
//! └────────┴────────┴──────────┴─────────┴──────────┘
//! ```
//!
//! The checksum is the XOR of every preceding byte in the frame, so the
//! XOR of a whole valid frame (checksum included) is zero. Keepalive
//! frames are a single opcode byte with no length/address/checksum.
//!
//! The host is the only initiator; the device answers read and write
//! requests against its 1 KiB configuration image and otherwise emits
//! periodic keepalives so the host can detect a live but quiet link.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod layout;
pub mod link;

pub use layout::{slot_addr, Eeprom, EEPROM_SIZE};
pub use link::{HostLink, LinkStatus, SerialPort, MAX_REQUEST};
