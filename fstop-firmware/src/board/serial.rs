//! Host serial adapter
//!
//! Bridges any buffered `embedded-io` port onto the protocol engine's
//! non-blocking byte interface. Transmit errors are dropped; the host
//! side recovers through its own timeouts.

use embedded_io::{Read, ReadReady, Write};

use fstop_protocol::link::SerialPort;

pub struct HostSerial<T> {
    port: T,
}

impl<T> HostSerial<T> {
    pub fn new(port: T) -> Self {
        Self { port }
    }
}

impl<T: Read + Write + ReadReady> SerialPort for HostSerial<T> {
    fn has_input(&mut self) -> bool {
        self.port.read_ready().unwrap_or(false)
    }

    fn read(&mut self) -> Option<u8> {
        if !self.has_input() {
            return None;
        }
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(n) if n > 0 => Some(byte[0]),
            _ => None,
        }
    }

    fn write(&mut self, byte: u8) {
        let _ = self.port.write(&[byte]);
    }
}
