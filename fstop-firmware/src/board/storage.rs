//! Flash-backed settings and program storage
//!
//! The 1 KiB EEPROM-style image lives in the last flash sector and is
//! mirrored in RAM. Byte writes only touch the mirror; the main loop
//! calls [`FlashEeprom::flush`] to commit, so a burst of writes (a slot
//! save, a host session) costs one erase cycle instead of many.

use defmt::warn;
use embassy_rp::flash::{Blocking, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;

use fstop_protocol::layout::{Eeprom, EEPROM_SIZE};

/// Total flash size on the reference board
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// The image occupies the final erase sector
const IMAGE_OFFSET: u32 = (FLASH_SIZE - ERASE_SIZE) as u32;

pub struct FlashEeprom {
    flash: Flash<'static, FLASH, Blocking, FLASH_SIZE>,
    image: [u8; EEPROM_SIZE],
    dirty: bool,
}

impl FlashEeprom {
    pub fn new(flash: FLASH) -> Self {
        let mut flash = Flash::new_blocking(flash);
        // unreadable flash behaves like a factory-fresh part
        let mut image = [0xFF; EEPROM_SIZE];
        if flash.blocking_read(IMAGE_OFFSET, &mut image).is_err() {
            warn!("settings image unreadable, starting blank");
            image = [0xFF; EEPROM_SIZE];
        }
        Self {
            flash,
            image,
            dirty: false,
        }
    }

    /// Commit the RAM mirror to flash if anything changed
    pub fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        let erased = self
            .flash
            .blocking_erase(IMAGE_OFFSET, IMAGE_OFFSET + ERASE_SIZE as u32);
        if erased.is_err() || self.flash.blocking_write(IMAGE_OFFSET, &self.image).is_err() {
            warn!("settings flush failed");
        }
        self.dirty = false;
    }
}

impl Eeprom for FlashEeprom {
    fn read(&self, addr: u16) -> u8 {
        self.image.get(usize::from(addr)).copied().unwrap_or(0xFF)
    }

    fn write(&mut self, addr: u16, value: u8) {
        if let Some(cell) = self.image.get_mut(usize::from(addr)) {
            if *cell != value {
                *cell = value;
                self.dirty = true;
            }
        }
    }
}
