use super::{Chip, DeviceIds};

pub const MANUFACTURER: u16 = 0xBF;
pub const DEVICE: u16 = 0xB5;

/// SST39SF010A holding the IDE controller's boot ROM.
///
/// The part sits on the low byte lane at even bus addresses only, so every
/// chip address is doubled on the bus.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sst39sf010;

impl Chip for Sst39sf010 {
    type Word = u8;
    type Variant = ();

    const NAME: &'static str = "SST39SF010A";
    const WINDOW: u32 = 0x1_0000;
    const DATA_SHIFT: u32 = 1;
    const CMD_ADDR_1: u32 = 0x5555 << 1;
    const CMD_ADDR_2: u32 = 0x2AAA << 1;

    fn recognize(ids: DeviceIds) -> Option<()> {
        if ids.manufacturer == MANUFACTURER && ids.device == DEVICE {
            Some(())
        } else {
            None
        }
    }
}

/// Largest image that fits the window, one byte per two bus addresses.
pub const CAPACITY: u32 = Sst39sf010::WINDOW >> Sst39sf010::DATA_SHIFT;
