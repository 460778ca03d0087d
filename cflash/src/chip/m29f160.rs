use super::{Chip, DeviceIds};

pub const MANUFACTURER: u16 = 0x0001;
pub const DEVICE_TOP: u16 = 0x22D2;
pub const DEVICE_BOTTOM: u16 = 0x22D8;

/// Which end of the device holds the small boot blocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootBlock {
    Top,
    Bottom,
}

/// 16Mbit 29F160 on the kickstart socket, in x16 mode.
///
/// Only 1MB of the part is visible at a time; the board's slot bit drives
/// the top address line.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct M29f160;

impl Chip for M29f160 {
    type Word = u16;
    type Variant = BootBlock;

    const NAME: &'static str = "29F160";
    const WINDOW: u32 = 0x10_0000;
    const DATA_SHIFT: u32 = 0;
    // flash A0 is CPU A1
    const CMD_ADDR_1: u32 = 0x555 << 1;
    const CMD_ADDR_2: u32 = 0x2AA << 1;

    fn recognize(ids: DeviceIds) -> Option<BootBlock> {
        match (ids.manufacturer, ids.device) {
            (MANUFACTURER, DEVICE_TOP) => Some(BootBlock::Top),
            (MANUFACTURER, DEVICE_BOTTOM) => Some(BootBlock::Bottom),
            _ => None,
        }
    }
}
