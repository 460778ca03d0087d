//! Boot ROM flashing for the IDE controller.
//!
//! The part is small enough that it is always chip-erased and rewritten
//! from offset 0.

use crate::bus::Bus;
use crate::chip::{DeviceIds, Identified, Sst39sf010};
use crate::error::Result;
use crate::flasher::{identify, write_source};
use crate::image::IdeImage;
use crate::protocol::{Completion, FlashDevice, Spin};
use crate::verify::verify;

pub struct IdeFlasher<B, P = Spin> {
    device: FlashDevice<Sst39sf010, B, P>,
    chip: Identified<Sst39sf010>,
    progress: bool,
}

impl<B, P> IdeFlasher<B, P>
where
    B: Bus<u8>,
    P: Completion,
{
    pub fn connect(mut device: FlashDevice<Sst39sf010, B, P>) -> Result<Self> {
        let chip = identify(&mut device)?;
        Ok(IdeFlasher {
            device,
            chip,
            progress: false,
        })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn ids(&self) -> DeviceIds {
        self.chip.ids()
    }

    pub fn into_inner(self) -> FlashDevice<Sst39sf010, B, P> {
        self.device
    }

    /// Erases the chip, writes `image` and reads it back.
    pub fn flash(&mut self, image: &IdeImage) -> Result<()> {
        log::info!("Erasing IDE flash");
        self.device.erase_chip();

        log::info!("Writing IDE ROM ({} bytes)", image.data().len());
        write_source(&mut self.device, image, 0, self.progress);

        self.verify(image)
    }

    pub fn verify(&mut self, image: &IdeImage) -> Result<()> {
        log::info!("Verifying IDE ROM");
        verify(&mut self.device, image, 0, self.progress)
    }
}
