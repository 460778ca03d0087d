use cflash::{
    board::{ControlRegister, Slot},
    bus::{read_words, Bus, Mmio},
    chip::{BootBlock, Chip, Identified, M29f160, Sst39sf010},
    geometry::Bank,
    image::{IdeImage, SizeClass, ROM_512K},
    protocol::FlashDevice,
    sim::{SimBoard, SimIde},
    Config, Error, Flasher, IdeFlasher, ProgramOperation,
};
use env_logger::Env;
use main_error::MainError;
use std::fs;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
struct BoardOpt {
    /// Control register address, overrides the config file
    #[structopt(long, parse(try_from_str = parse_int::parse))]
    control: Option<u32>,
    /// Kickstart flash window base, overrides the config file
    #[structopt(long, parse(try_from_str = parse_int::parse))]
    flash_base: Option<u32>,
    /// Flash slot, each slot holds two banks
    #[structopt(short, long, default_value = "0", possible_values = &["0", "1"])]
    slot: u8,
    /// Run against an in-memory board instead of the hardware
    #[structopt(long)]
    simulate: bool,
}

#[derive(StructOpt)]
struct SourceOpt {
    /// Use the running Kickstart ROM as the image
    #[structopt(long, conflicts_with = "file", required_unless = "file")]
    rom: bool,
    /// Kickstart ROM file
    #[structopt(parse(from_os_str))]
    file: Option<PathBuf>,
    /// Bank within the slot
    #[structopt(short, long, default_value = "1", possible_values = &["0", "1"])]
    bank: u8,
}

#[derive(StructOpt)]
struct ProgramOpt {
    #[structopt(flatten)]
    board: BoardOpt,
    #[structopt(flatten)]
    source: SourceOpt,
    /// Don't read the bank back after programming
    #[structopt(long)]
    skip_verify: bool,
}

#[derive(StructOpt)]
struct VerifyOpt {
    #[structopt(flatten)]
    board: BoardOpt,
    #[structopt(flatten)]
    source: SourceOpt,
}

#[derive(StructOpt)]
struct EraseBankOpt {
    #[structopt(flatten)]
    board: BoardOpt,
    /// Bank within the slot
    #[structopt(short, long, default_value = "1", possible_values = &["0", "1"])]
    bank: u8,
}

#[derive(StructOpt)]
struct IdeOpt {
    /// IDE flash base address, overrides the config file
    #[structopt(long, parse(try_from_str = parse_int::parse))]
    ide_base: Option<u32>,
    /// Run against an in-memory IDE flash instead of the hardware
    #[structopt(long)]
    simulate: bool,
    /// IDE boot ROM file
    #[structopt(parse(from_os_str))]
    file: PathBuf,
}

#[derive(StructOpt)]
enum Opt {
    /// Print the flash manufacturer and device ids
    Identify(BoardOpt),
    /// Erase a bank and write a Kickstart ROM to it
    Program(ProgramOpt),
    /// Check a bank against a Kickstart ROM
    Verify(VerifyOpt),
    /// Erase one bank
    EraseBank(EraseBankOpt),
    /// Erase the whole flash
    EraseChip(BoardOpt),
    /// Write the IDE controller's boot ROM
    Ide(IdeOpt),
}

struct Board {
    control: Box<dyn Bus<u16>>,
    flash: Box<dyn Bus<u16>>,
    resident: Option<Box<dyn Bus<u16>>>,
}

impl BoardOpt {
    fn open(&self, config: &Config) -> Result<Board, Error> {
        if self.simulate {
            log::info!("Using simulated board");
            let sim = SimBoard::new(BootBlock::Top);
            return Ok(Board {
                control: Box::new(sim.control()),
                flash: Box::new(sim.flash()),
                resident: None,
            });
        }

        let control = self
            .control
            .or(config.control)
            .ok_or(Error::MissingAddress("control register"))?;
        let flash_base = self.flash_base.unwrap_or(config.flash_base);
        // Safety: these are the board's documented address ranges, and
        // nothing else in this process touches them.
        unsafe {
            Ok(Board {
                control: Box::new(Mmio::<u16>::new(control as usize, 2)),
                flash: Box::new(Mmio::<u16>::new(flash_base as usize, M29f160::WINDOW)),
                resident: Some(Box::new(Mmio::<u16>::new(
                    config.kickstart_rom as usize,
                    ROM_512K,
                ))),
            })
        }
    }

    /// Flash-wide bank index of `bank` within the selected slot.
    fn bank(&self, bank: u8) -> Result<Bank, Error> {
        Bank::new(self.slot * 2 + bank)
    }
}

impl SourceOpt {
    /// Reads the image file, if one was given, checking its size first.
    fn read_file(&self) -> Result<Option<Vec<u8>>, Error> {
        match &self.file {
            Some(path) => {
                SizeClass::from_len(fs::metadata(path)?.len() as usize)?;
                log::info!("Reading kick file {}", path.display());
                Ok(Some(fs::read(path)?))
            }
            None => Ok(None),
        }
    }
}

impl Board {
    fn prepare(&mut self, slot: u8) -> Result<(), Error> {
        let mut control = ControlRegister::new(&mut *self.control);
        control.ensure_flash_accessible()?;
        control.select_slot(Slot::new(slot)?);
        Ok(())
    }

    fn device(&mut self) -> FlashDevice<M29f160, &mut dyn Bus<u16>> {
        let bus: &mut dyn Bus<u16> = &mut *self.flash;
        FlashDevice::new(bus)
    }

    fn flasher(
        &mut self,
        slot: u8,
        config: &Config,
    ) -> Result<Flasher<&mut dyn Bus<u16>>, Error> {
        let mut control = ControlRegister::new(&mut *self.control);
        let bus: &mut dyn Bus<u16> = &mut *self.flash;
        let flasher = Flasher::connect(&mut control, Slot::new(slot)?, FlashDevice::new(bus))?;
        Ok(flasher.with_progress(config.progress))
    }

    fn resident_rom(&mut self) -> Result<Vec<u8>, Error> {
        let bus = self
            .resident
            .as_mut()
            .ok_or(Error::ResidentRomUnavailable)?;
        log::info!("Copying Kickstart ROM");
        Ok(read_words(&mut **bus, ROM_512K))
    }

    /// Image from the file if there is one, the running Kickstart otherwise.
    fn source(&mut self, file: Option<Vec<u8>>) -> Result<Vec<u8>, Error> {
        match file {
            Some(data) => Ok(data),
            None => self.resident_rom(),
        }
    }
}

fn identify(opt: BoardOpt, config: &Config) -> Result<(), Error> {
    let mut board = opt.open(config)?;
    board.prepare(opt.slot)?;
    let ids = board.device().identify();
    log::info!(
        "Manufacturer: {:04X}, Device: {:04X}",
        ids.manufacturer,
        ids.device
    );
    match Identified::<M29f160>::new(ids) {
        Some(chip) => log::info!("{} with {:?} boot block", M29f160::NAME, chip.variant()),
        None => log::warn!("Unknown flash device, check that ROM overlay is switched off"),
    }
    Ok(())
}

fn program(opt: ProgramOpt, config: &Config) -> Result<(), Error> {
    let file = opt.source.read_file()?;
    let bank = opt.board.bank(opt.source.bank)?;
    let mut board = opt.board.open(config)?;
    let data = board.source(file)?;

    let mut flasher = board.flasher(opt.board.slot, config)?;
    let bank = flasher.program(ProgramOperation {
        data,
        bank,
        skip_verify: opt.skip_verify,
    })?;
    flasher.reset();
    log::info!("Success, bank {} programmed", bank);

    Ok(())
}

fn verify(opt: VerifyOpt, config: &Config) -> Result<(), Error> {
    let file = opt.source.read_file()?;
    let bank = opt.board.bank(opt.source.bank)?;
    let mut board = opt.board.open(config)?;
    let data = board.source(file)?;

    let bank = board.flasher(opt.board.slot, config)?.verify(data, bank)?;
    log::info!("Bank {} matches", bank);

    Ok(())
}

fn erase_bank(opt: EraseBankOpt, config: &Config) -> Result<(), Error> {
    let bank = opt.board.bank(opt.bank)?;
    let mut board = opt.board.open(config)?;
    board.flasher(opt.board.slot, config)?.erase_bank(bank);

    Ok(())
}

fn erase_chip(opt: BoardOpt, config: &Config) -> Result<(), Error> {
    let mut board = opt.open(config)?;
    board.flasher(opt.slot, config)?.erase_chip();

    Ok(())
}

fn ide(opt: IdeOpt, config: &Config) -> Result<(), Error> {
    let image = IdeImage::load(&opt.file)?;
    log::info!("Flashing IDE ROM {}", opt.file.display());

    let mut bus: Box<dyn Bus<u8>> = if opt.simulate {
        Box::new(SimIde::new().flash())
    } else {
        let base = opt
            .ide_base
            .or(config.ide_base)
            .ok_or(Error::MissingAddress("IDE flash"))?;
        // Safety: the IDE board's ROM window, owned by this process.
        Box::new(unsafe { Mmio::<u8>::new(base as usize, Sst39sf010::WINDOW) })
    };

    let device = FlashDevice::<Sst39sf010, _>::new(&mut *bus);
    IdeFlasher::connect(device)?
        .with_progress(config.progress)
        .flash(&image)?;
    log::info!("Success");

    Ok(())
}

#[paw::main]
fn main(args: Opt) -> Result<(), MainError> {
    env_logger::Builder::from_env(Env::default().default_filter_or("cflash=info"))
        .format_timestamp(None)
        .init();
    let config = Config::load();

    match args {
        Opt::Identify(opt) => identify(opt, &config)?,
        Opt::Program(opt) => program(opt, &config)?,
        Opt::Verify(opt) => verify(opt, &config)?,
        Opt::EraseBank(opt) => erase_bank(opt, &config)?,
        Opt::EraseChip(opt) => erase_chip(opt, &config)?,
        Opt::Ide(opt) => ide(opt, &config)?,
    };

    Ok(())
}
