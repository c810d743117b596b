//! Persistent-storage address map
//!
//! A flat 1 KiB byte space holds the global settings in a low reserved
//! region and seven fixed-size program slots above it. The serial link
//! and the timer's own configuration code share these addresses, so they
//! live here rather than in the core crate.

/// Backlight level (1 byte)
pub const EE_BACKLIGHT: u16 = 0x00;
/// Drydown factor, hundredths of a stop (1 byte)
pub const EE_DRYDOWN: u16 = 0x01;
/// Whether drydown compensation is applied (1 byte)
pub const EE_DRYAPPLY: u16 = 0x02;
/// Rotary encoder step size, hundredths of a stop per detent (1 byte)
pub const EE_ROTARY: u16 = 0x03;
/// Test-strip base exposure, hundredths of a stop (2 bytes, big-endian)
pub const EE_STRIPBASE: u16 = 0x04;
/// Test-strip step increment, hundredths of a stop (2 bytes, big-endian)
pub const EE_STRIPSTEP: u16 = 0x06;
/// Test-strip cumulative-cover mode flag (1 byte)
pub const EE_STRIPCOV: u16 = 0x08;
/// Firmware version code (1 byte); mismatch triggers first-boot defaults
pub const EE_VERSION: u16 = 0x09;
/// Split-grade exposure flag (1 byte)
pub const EE_SPLITGRADE: u16 = 0x0A;
/// End of the reserved settings region; hosts may not write below this
pub const EE_CONFIG_TOP: u16 = 0x0B;
/// End of the address space
pub const EE_TOP: u16 = 0x400;

/// Total size of the storage image in bytes
pub const EEPROM_SIZE: usize = EE_TOP as usize;

/// Base address of the first program slot
pub const SLOT_BASE: u16 = 0x80;
/// Bytes per program slot; seven slots tile SLOT_BASE..EE_TOP exactly
pub const SLOT_SIZE: u16 = 0x80;
/// Lowest valid slot number
pub const FIRST_SLOT: u8 = 1;
/// Highest valid slot number
pub const LAST_SLOT: u8 = 7;

/// Resolve a slot number to its base address.
///
/// Returns `None` for slot numbers outside `FIRST_SLOT..=LAST_SLOT`.
pub fn slot_addr(slot: u8) -> Option<u16> {
    if (FIRST_SLOT..=LAST_SLOT).contains(&slot) {
        Some(SLOT_BASE + u16::from(slot - FIRST_SLOT) * SLOT_SIZE)
    } else {
        None
    }
}

/// Byte-addressable persistent storage.
///
/// Implementations mirror an EEPROM-style device: reads are cheap,
/// writes may be deferred to a later flush. Addresses past the end of
/// the image read as 0xFF and ignore writes; callers are expected to
/// stay within `EE_TOP`.
pub trait Eeprom {
    /// Read one byte
    fn read(&self, addr: u16) -> u8;

    /// Write one byte
    fn write(&mut self, addr: u16, value: u8);

    /// Read a big-endian u16
    fn read_u16(&self, addr: u16) -> u16 {
        u16::from(self.read(addr)) << 8 | u16::from(self.read(addr + 1))
    }

    /// Write a big-endian u16
    fn write_u16(&mut self, addr: u16, value: u16) {
        self.write(addr, (value >> 8) as u8);
        self.write(addr + 1, (value & 0xFF) as u8);
    }
}

impl Eeprom for [u8; EEPROM_SIZE] {
    fn read(&self, addr: u16) -> u8 {
        self.get(addr as usize).copied().unwrap_or(0xFF)
    }

    fn write(&mut self, addr: u16, value: u8) {
        if let Some(cell) = self.get_mut(addr as usize) {
            *cell = value;
        }
    }
}
