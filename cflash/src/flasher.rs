use crate::board::{ControlRegister, Slot};
use crate::bus::{Bus, Word};
use crate::chip::{BootBlock, Chip, DeviceIds, Identified, M29f160};
use crate::error::{Error, Result};
use crate::geometry::{Bank, BankGeometry};
use crate::image::{RomImage, SizeClass, Source};
use crate::protocol::{Completion, FlashDevice, Spin};
use crate::verify::verify;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::time::Instant;

pub(crate) fn get_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {wide_bar} {bytes}/{total_bytes} {bytes_per_sec} {eta}  ")
            .progress_chars("#>-"),
    );
    bar
}

/// Reads the device ids and matches them against the chip's known parts.
pub fn identify<C, B, P>(device: &mut FlashDevice<C, B, P>) -> Result<Identified<C>>
where
    C: Chip,
    B: Bus<C::Word>,
    P: Completion,
{
    let ids = device.identify();
    Identified::new(ids).ok_or(Error::UnknownDevice {
        manufacturer: ids.manufacturer,
        device: ids.device,
    })
}

/// Programs every unit of `source` starting at data address `base`.
pub(crate) fn write_source<C, B, P, S>(
    device: &mut FlashDevice<C, B, P>,
    source: &S,
    base: u32,
    progress: bool,
) where
    C: Chip,
    B: Bus<C::Word>,
    P: Completion,
    S: Source,
{
    let span = source.span();
    let stride = C::Word::BYTES;
    let start = Instant::now();
    let bar = get_bar(span as u64, progress);
    for offset in (0..span).step_by(stride as usize) {
        device.program(base + offset, source.unit(offset));
        bar.inc(stride as u64);
    }
    bar.finish_and_clear();
    let elapsed = start.elapsed();
    log::info!(
        "Program done {:?} {}/s",
        elapsed,
        HumanBytes((span as f64 / elapsed.as_secs_f64().max(1e-3)) as u64)
    );
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    BadSize,
    Mismatch,
}

/// Where the last program or verify operation got to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Validating,
    Erasing,
    Programming,
    Verifying,
    Done,
    Failed(Failure),
}

/// Where an image will land and which banks must be erased for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramPlan {
    pub bank: Bank,
    /// A 1M image was moved down from an odd bank.
    pub realigned: bool,
    /// Banks to erase, in order.
    pub erase: Vec<Bank>,
}

/// 1M images cover a bank pair and must start on the even bank; the higher
/// bank is erased first.
pub fn plan(size: SizeClass, bank: Bank) -> ProgramPlan {
    if size != SizeClass::Rom1M {
        return ProgramPlan {
            bank,
            realigned: false,
            erase: vec![bank],
        };
    }

    let base = bank.pair_base();
    ProgramPlan {
        bank: base,
        realigned: base != bank,
        erase: base.next().into_iter().chain(Some(base)).collect(),
    }
}

pub struct ProgramOperation {
    /// Raw ROM contents; the size is validated before anything is erased.
    pub data: Vec<u8>,
    pub bank: Bank,
    pub skip_verify: bool,
}

/// Drives the kickstart flash through erase, program and verify.
///
/// Bank addresses above the 1MB window wrap into it, so every bank used
/// through one `Flasher` must live in the slot it was connected with.
pub struct Flasher<B, P = Spin> {
    device: FlashDevice<M29f160, B, P>,
    chip: Identified<M29f160>,
    stage: Stage,
    progress: bool,
}

impl<B, P> Flasher<B, P>
where
    B: Bus<u16>,
    P: Completion,
{
    /// Selects `slot`, then identifies the device. Fails without touching
    /// the flash while bonus RAM hides it, and refuses parts that aren't a
    /// 29F160.
    pub fn connect<R: Bus<u16>>(
        control: &mut ControlRegister<R>,
        slot: Slot,
        mut device: FlashDevice<M29f160, B, P>,
    ) -> Result<Self> {
        control.ensure_flash_accessible()?;
        control.select_slot(slot);
        let chip = identify(&mut device)?;
        log::info!(
            "Found {} ({:?} boot block)",
            M29f160::NAME,
            chip.variant()
        );
        Ok(Flasher {
            device,
            chip,
            stage: Stage::Idle,
            progress: false,
        })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn into_inner(self) -> FlashDevice<M29f160, B, P> {
        self.device
    }

    pub fn ids(&self) -> DeviceIds {
        self.chip.ids()
    }

    pub fn boot_block(&self) -> BootBlock {
        self.chip.variant()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Erases every block of `bank`, one after the other.
    pub fn erase_bank(&mut self, bank: Bank) {
        log::info!("Erasing bank {}", bank);
        let geometry = BankGeometry::resolve(self.chip.variant(), bank);
        for address in geometry.addresses() {
            log::trace!("Erase block {:06x}", address);
            self.device.erase_block(address);
        }
    }

    pub fn erase_chip(&mut self) {
        log::info!("Erasing chip");
        self.device.erase_chip();
    }

    pub fn reset(&mut self) {
        self.device.reset();
    }

    /// Erases, programs and (unless skipped) verifies a ROM image. Returns
    /// the bank the image was written to.
    pub fn program(&mut self, op: ProgramOperation) -> Result<Bank> {
        let image = self.validate(op.data)?;
        let plan = plan(image.size_class(), op.bank);
        if plan.realigned {
            log::warn!(
                "Cannot write 1MB ROM to odd banks, forcing alignment to bank {}",
                plan.bank
            );
        }

        self.set_stage(Stage::Erasing);
        for &bank in &plan.erase {
            self.erase_bank(bank);
        }

        self.set_stage(Stage::Programming);
        log::info!("Program bank {}... {:x}", plan.bank, image.digest());
        write_source(
            &mut self.device,
            &image,
            plan.bank.address(),
            self.progress,
        );

        if !op.skip_verify {
            self.check(&image, plan.bank)?;
        }
        self.set_stage(Stage::Done);
        Ok(plan.bank)
    }

    /// Compares a bank (or bank pair) against a ROM image. Returns the bank
    /// that was checked.
    pub fn verify(&mut self, data: Vec<u8>, bank: Bank) -> Result<Bank> {
        let image = self.validate(data)?;
        let plan = plan(image.size_class(), bank);
        if plan.realigned {
            log::warn!(
                "1MB ROMs start at an even bank, verifying from bank {}",
                plan.bank
            );
        }
        self.check(&image, plan.bank)?;
        self.set_stage(Stage::Done);
        Ok(plan.bank)
    }

    fn validate(&mut self, data: Vec<u8>) -> Result<RomImage> {
        self.set_stage(Stage::Validating);
        RomImage::from_bytes(data).map_err(|e| {
            self.set_stage(Stage::Failed(Failure::BadSize));
            e
        })
    }

    fn check(&mut self, image: &RomImage, bank: Bank) -> Result<()> {
        self.set_stage(Stage::Verifying);
        log::info!("Verifying bank {}", bank);
        let result = verify(&mut self.device, image, bank.address(), self.progress);
        if result.is_err() {
            self.set_stage(Stage::Failed(Failure::Mismatch));
        }
        result
    }

    fn set_stage(&mut self, stage: Stage) {
        log::debug!("{:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }
}
