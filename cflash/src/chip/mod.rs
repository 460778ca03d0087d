pub mod m29f160;
pub mod sst39sf010;

pub use m29f160::{BootBlock, M29f160};
pub use sst39sf010::Sst39sf010;

use crate::bus::Word;
use std::fmt::Debug;

/// Raw identification read back in ID mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceIds {
    pub manufacturer: u16,
    pub device: u16,
}

/// Static description of a flash part and how it is wired to the bus.
///
/// Command offsets are bus byte offsets from the start of the device window.
/// Data addresses passed to the driver are shifted left by `DATA_SHIFT`
/// before they reach the bus, then wrapped to `WINDOW`.
pub trait Chip {
    type Word: Word;
    /// What a successful identification tells us about the part.
    type Variant: Copy + Debug + PartialEq;

    const NAME: &'static str;
    const WINDOW: u32;
    const DATA_SHIFT: u32;
    const CMD_ADDR_1: u32;
    const CMD_ADDR_2: u32;

    /// Maps ids to a known variant of this part.
    fn recognize(ids: DeviceIds) -> Option<Self::Variant>;
}

/// Result of an identify call that matched a known part.
///
/// Only [`Identified::new`] produces one, so holding a value is proof that
/// the device answered with ids the chip recognizes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Identified<C: Chip> {
    ids: DeviceIds,
    variant: C::Variant,
}

impl<C: Chip> Identified<C> {
    pub fn new(ids: DeviceIds) -> Option<Self> {
        C::recognize(ids).map(|variant| Identified { ids, variant })
    }

    pub fn ids(&self) -> DeviceIds {
        self.ids
    }

    pub fn variant(&self) -> C::Variant {
        self.variant
    }
}
