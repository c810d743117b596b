//! Program slot storage
//!
//! Seven 128-byte slots hold saved programs. Each of the eight steps
//! packs into a 16-byte record:
//!
//! ```text
//! ┌───────────────┬───────┬──────┬──────┬──────────┐
//! │ STOPS (i16 BE)│ GRADE │ HARD │ SOFT │ TEXT 11B │
//! └───────────────┴───────┴──────┴──────┴──────────┘
//! ```
//!
//! Text is ASCII, zero-padded. Compiled exposures are never stored;
//! programs recompile after loading.

use fstop_protocol::layout::{slot_addr, Eeprom, FIRST_SLOT, LAST_SLOT};

use crate::program::{Mode, Program, MAX_STEPS, TEXT_LEN};

/// 16 bytes per step record
const RECORD_SIZE: u16 = 5 + TEXT_LEN as u16;

/// Slot access failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotError {
    /// Slot number outside 1..=7
    InvalidSlot,
}

impl Program {
    /// Persist the steps into a slot
    pub fn save<E: Eeprom>(&self, slot: u8, eeprom: &mut E) -> Result<(), SlotError> {
        let base = slot_addr(slot).ok_or(SlotError::InvalidSlot)?;

        for (i, step) in (0..MAX_STEPS).map(|i| (i, self.step(i))) {
            let mut addr = base + i as u16 * RECORD_SIZE;
            eeprom.write_u16(addr, step.stops as u16);
            addr += 2;
            eeprom.write(addr, step.grade);
            addr += 1;
            eeprom.write(addr, step.hard as u8);
            addr += 1;
            eeprom.write(addr, step.soft as u8);
            addr += 1;
            let text = step.text.as_bytes();
            for t in 0..TEXT_LEN {
                eeprom.write(addr + t as u16, text.get(t).copied().unwrap_or(0));
            }
        }
        Ok(())
    }

    /// Replace the steps with a slot's contents.
    ///
    /// The program reverts to normal (non-strip) mode; previously
    /// compiled exposures are discarded.
    pub fn load<E: Eeprom>(&mut self, slot: u8, eeprom: &E) -> Result<(), SlotError> {
        let base = slot_addr(slot).ok_or(SlotError::InvalidSlot)?;

        for i in 0..MAX_STEPS {
            let mut addr = base + i as u16 * RECORD_SIZE;
            let step = &mut self.steps_mut()[i];
            step.stops = eeprom.read_u16(addr) as i16;
            addr += 2;
            step.grade = eeprom.read(addr);
            addr += 1;
            step.hard = eeprom.read(addr) != 0;
            addr += 1;
            step.soft = eeprom.read(addr) != 0;
            addr += 1;

            step.text.clear();
            for t in 0..TEXT_LEN {
                let b = eeprom.read(addr + t as u16);
                if b == 0 || !b.is_ascii() {
                    break;
                }
                let _ = step.text.push(b as char);
            }
        }

        // slots only ever hold normal programs
        self.mode = Mode::Normal;
        self.clear_exposures();
        Ok(())
    }
}

/// Number of usable slots
pub const SLOT_COUNT: u8 = LAST_SLOT - FIRST_SLOT + 1;
