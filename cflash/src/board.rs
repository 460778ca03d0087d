//! The board's control register.
//!
//! Writes are set/clear: bits written together with [`SET`] are set, bits
//! written without it are cleared. Reads return the current state.

use crate::bus::Bus;
use crate::error::{Error, Result};

pub const SET: u16 = 1 << 12;
/// Maps RAM over $A00000-$BEFFFF, hiding the flash window.
pub const BONUS_RAM: u16 = 1 << 13;
/// Drives the flash's top address line: which 1MB half is in the window.
pub const SLOT: u16 = 1 << 14;

/// One 1MB half of the kickstart flash.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot(u8);

impl Slot {
    pub fn new(index: u8) -> Result<Self> {
        match index {
            0 | 1 => Ok(Slot(index)),
            _ => Err(Error::InvalidSlot(index)),
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

pub struct ControlRegister<B> {
    bus: B,
}

impl<B: Bus<u16>> ControlRegister<B> {
    pub fn new(bus: B) -> Self {
        ControlRegister { bus }
    }

    pub fn select_slot(&mut self, slot: Slot) {
        log::debug!("Selecting slot {}", slot.index());
        if slot.index() == 1 {
            self.bus.write(0, SET | SLOT);
        } else {
            self.bus.write(0, SLOT);
        }
    }

    pub fn slot(&mut self) -> Slot {
        Slot((self.bus.read(0) & SLOT != 0) as u8)
    }

    pub fn overlay_enabled(&mut self) -> bool {
        self.bus.read(0) & BONUS_RAM != 0
    }

    /// Fails if bonus RAM currently shadows the flash window.
    pub fn ensure_flash_accessible(&mut self) -> Result<()> {
        if self.overlay_enabled() {
            Err(Error::OverlayEnabled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Latch(u16, Vec<u16>);

    impl Bus<u16> for Latch {
        fn read(&mut self, _offset: u32) -> u16 {
            self.0
        }

        fn write(&mut self, _offset: u32, value: u16) {
            self.1.push(value);
            if value & SET != 0 {
                self.0 |= value & !SET;
            } else {
                self.0 &= !value;
            }
        }
    }

    #[test]
    fn slot_select_writes() {
        let mut reg = ControlRegister::new(Latch(0, vec![]));
        reg.select_slot(Slot(1));
        assert_eq!(reg.slot(), Slot(1));
        reg.select_slot(Slot(0));
        assert_eq!(reg.slot(), Slot(0));
        assert_eq!(reg.bus.1, vec![SET | SLOT, SLOT]);
    }

    #[test]
    fn overlay_blocks_flash_access() {
        let mut reg = ControlRegister::new(Latch(BONUS_RAM, vec![]));
        assert!(matches!(
            reg.ensure_flash_accessible(),
            Err(Error::OverlayEnabled)
        ));
        reg.bus.0 = 0;
        assert!(reg.ensure_flash_accessible().is_ok());
    }

    #[test]
    fn slot_range() {
        assert!(Slot::new(1).is_ok());
        assert!(matches!(Slot::new(2), Err(Error::InvalidSlot(2))));
    }
}
