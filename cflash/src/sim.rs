//! In-memory model of the board for dry runs and tests.
//!
//! The flash model follows the datasheet state machine closely enough to
//! reject out-of-sequence commands: writes that don't complete an unlock
//! sequence drop the device back to read mode, programming only clears bits,
//! and DQ6 toggles for a few reads after every program or erase.

use crate::board::{SET, SLOT};
use crate::bus::{Bus, Word};
use crate::chip::{m29f160, sst39sf010, BootBlock, Chip, DeviceIds, M29f160, Sst39sf010};
use byteorder::{BigEndian, ByteOrder};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::ops::Range;
use std::rc::Rc;

/// Full size of the 29F160, both slots.
const KICK_FLASH_SIZE: u32 = 2 * M29f160::WINDOW;
const PROGRAM_BUSY_READS: u32 = 3;
const ERASE_BUSY_READS: u32 = 9;

/// Something the simulated flash did. Addresses are flat bus addresses: slot
/// base plus window offset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Program { address: u32, value: u16 },
    EraseSector { start: u32 },
    EraseChip,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Read,
    Unlock1,
    Unlocked,
    Program,
    EraseSetup,
    EraseUnlock1,
    EraseUnlocked,
    Id,
}

struct Model {
    mem: Vec<u16>,
    erased: u16,
    ids: DeviceIds,
    sectors: Vec<Range<u32>>,
    cmd_addr: (u32, u32),
    window: u32,
    mode: Mode,
    busy: u32,
    dq6: bool,
    events: Vec<Event>,
    control: Option<Rc<Cell<u16>>>,
}

impl Model {
    fn new<C: Chip>(ids: DeviceIds, size: u32, sectors: Vec<Range<u32>>) -> Self {
        let erased: u16 = C::Word::truncate(0xFFFF).into();
        Model {
            mem: vec![erased; (size >> 1) as usize],
            erased,
            ids,
            sectors,
            cmd_addr: (C::CMD_ADDR_1, C::CMD_ADDR_2),
            window: C::WINDOW,
            mode: Mode::Read,
            busy: 0,
            dq6: false,
            events: Vec::new(),
            control: None,
        }
    }

    fn flat(&self, offset: u32) -> u32 {
        let slot = match &self.control {
            Some(reg) if reg.get() & SLOT != 0 => self.window,
            _ => 0,
        };
        slot + (offset % self.window)
    }

    fn read(&mut self, offset: u32) -> u16 {
        let data = match self.mode {
            Mode::Id if offset == 0 => self.ids.manufacturer,
            Mode::Id if offset == 2 => self.ids.device,
            _ => self.mem[(self.flat(offset) >> 1) as usize],
        };
        if self.busy > 0 {
            self.busy -= 1;
            self.dq6 = !self.dq6;
            return (data & !(1 << 6)) | if self.dq6 { 1 << 6 } else { 0 };
        }
        data
    }

    fn write(&mut self, offset: u32, value: u16) {
        let (cmd1, cmd2) = self.cmd_addr;
        if self.mode == Mode::Program {
            self.program(offset, value);
            self.mode = Mode::Read;
            return;
        }
        if value == 0xF0 {
            self.mode = Mode::Read;
            return;
        }
        self.mode = match (self.mode, offset, value) {
            (Mode::Read, o, 0xAA) | (Mode::Id, o, 0xAA) if o == cmd1 => Mode::Unlock1,
            (Mode::Id, _, _) => Mode::Id,
            (Mode::Unlock1, o, 0x55) if o == cmd2 => Mode::Unlocked,
            (Mode::Unlocked, o, 0xA0) if o == cmd1 => Mode::Program,
            (Mode::Unlocked, o, 0x80) if o == cmd1 => Mode::EraseSetup,
            (Mode::Unlocked, o, 0x90) if o == cmd1 => Mode::Id,
            (Mode::EraseSetup, o, 0xAA) if o == cmd1 => Mode::EraseUnlock1,
            (Mode::EraseUnlock1, o, 0x55) if o == cmd2 => Mode::EraseUnlocked,
            (Mode::EraseUnlocked, o, 0x10) if o == cmd1 => {
                self.erase_chip();
                Mode::Read
            }
            (Mode::EraseUnlocked, o, 0x30) => {
                self.erase_sector(o);
                Mode::Read
            }
            _ => Mode::Read,
        };
    }

    fn program(&mut self, offset: u32, value: u16) {
        let address = self.flat(offset);
        self.events.push(Event::Program { address, value });
        self.mem[(address >> 1) as usize] &= value;
        self.busy = PROGRAM_BUSY_READS;
    }

    fn erase_chip(&mut self) {
        self.events.push(Event::EraseChip);
        let erased = self.erased;
        self.mem.iter_mut().for_each(|w| *w = erased);
        self.busy = ERASE_BUSY_READS;
    }

    fn erase_sector(&mut self, offset: u32) {
        let address = self.flat(offset);
        let sector = self
            .sectors
            .iter()
            .find(|s| s.contains(&address))
            .cloned()
            .unwrap_or(address..address);
        self.events.push(Event::EraseSector {
            start: sector.start,
        });
        let erased = self.erased;
        self.mem[(sector.start >> 1) as usize..(sector.end >> 1) as usize]
            .iter_mut()
            .for_each(|w| *w = erased);
        self.busy = ERASE_BUSY_READS;
    }
}

/// Bus view of a simulated flash part.
pub struct SimFlash<W> {
    model: Rc<RefCell<Model>>,
    _word: PhantomData<W>,
}

impl<W: Word> Bus<W> for SimFlash<W> {
    fn read(&mut self, offset: u32) -> W {
        W::truncate(self.model.borrow_mut().read(offset))
    }

    fn write(&mut self, offset: u32, value: W) {
        self.model.borrow_mut().write(offset, value.into())
    }
}

/// Bus view of the simulated control register.
pub struct SimControl {
    reg: Rc<Cell<u16>>,
}

impl Bus<u16> for SimControl {
    fn read(&mut self, _offset: u32) -> u16 {
        self.reg.get()
    }

    fn write(&mut self, _offset: u32, value: u16) {
        let bits = value & !SET;
        if value & SET != 0 {
            self.reg.set(self.reg.get() | bits);
        } else {
            self.reg.set(self.reg.get() & !bits);
        }
    }
}

/// Sector map of the 29F160 as flat byte ranges.
fn m29f160_sectors(boot: BootBlock) -> Vec<Range<u32>> {
    let boot_blocks: [u32; 4] = match boot {
        BootBlock::Bottom => [0x4000, 0x2000, 0x2000, 0x8000],
        BootBlock::Top => [0x8000, 0x2000, 0x2000, 0x4000],
    };
    let (low, high) = match boot {
        BootBlock::Bottom => (boot_blocks.to_vec(), vec![0x1_0000; 31]),
        BootBlock::Top => (vec![0x1_0000; 31], boot_blocks.to_vec()),
    };
    let mut start = 0;
    low.into_iter()
        .chain(high)
        .map(|size| {
            let sector = start..start + size;
            start += size;
            sector
        })
        .collect()
}

/// Kickstart flash and control register sharing the slot line.
pub struct SimBoard {
    control: Rc<Cell<u16>>,
    flash: Rc<RefCell<Model>>,
}

impl SimBoard {
    /// A board carrying a blank 29F160 of the given orientation.
    pub fn new(boot: BootBlock) -> Self {
        let device = match boot {
            BootBlock::Top => m29f160::DEVICE_TOP,
            BootBlock::Bottom => m29f160::DEVICE_BOTTOM,
        };
        let ids = DeviceIds {
            manufacturer: m29f160::MANUFACTURER,
            device,
        };
        Self::with_ids(ids, boot)
    }

    /// A board whose flash answers ID mode with `ids`.
    pub fn with_ids(ids: DeviceIds, boot: BootBlock) -> Self {
        let control = Rc::new(Cell::new(0));
        let mut model = Model::new::<M29f160>(ids, KICK_FLASH_SIZE, m29f160_sectors(boot));
        model.control = Some(control.clone());
        SimBoard {
            control,
            flash: Rc::new(RefCell::new(model)),
        }
    }

    pub fn control(&self) -> SimControl {
        SimControl {
            reg: self.control.clone(),
        }
    }

    pub fn flash(&self) -> SimFlash<u16> {
        SimFlash {
            model: self.flash.clone(),
            _word: PhantomData,
        }
    }

    pub fn set_overlay(&self, enabled: bool) {
        let mut control = self.control();
        control.write(0, crate::board::BONUS_RAM | if enabled { SET } else { 0 });
    }

    /// Flash contents over flat byte addresses, most significant byte first.
    pub fn contents(&self, range: Range<u32>) -> Vec<u8> {
        let model = self.flash.borrow();
        let mut out = vec![0u8; range.len()];
        for (i, chunk) in out.chunks_exact_mut(2).enumerate() {
            let word = model.mem[((range.start >> 1) as usize) + i];
            BigEndian::write_u16(chunk, word);
        }
        out
    }

    /// Flips the bits in `mask` of the byte at flat address `address`.
    pub fn corrupt(&self, address: u32, mask: u8) {
        let mut model = self.flash.borrow_mut();
        let shift = if address & 1 == 0 { 8 } else { 0 };
        model.mem[(address >> 1) as usize] ^= (mask as u16) << shift;
    }

    pub fn events(&self) -> Vec<Event> {
        self.flash.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.flash.borrow_mut().events.clear();
    }
}

/// The IDE controller's boot ROM flash.
pub struct SimIde {
    flash: Rc<RefCell<Model>>,
}

impl SimIde {
    pub fn new() -> Self {
        Self::with_ids(DeviceIds {
            manufacturer: sst39sf010::MANUFACTURER,
            device: sst39sf010::DEVICE,
        })
    }

    pub fn with_ids(ids: DeviceIds) -> Self {
        // 4K chip sectors, each spread over 8K of bus addresses
        let sectors = (0..Sst39sf010::WINDOW)
            .step_by(0x2000)
            .map(|s| s..s + 0x2000)
            .collect();
        let model = Model::new::<Sst39sf010>(ids, Sst39sf010::WINDOW, sectors);
        SimIde {
            flash: Rc::new(RefCell::new(model)),
        }
    }

    pub fn flash(&self) -> SimFlash<u8> {
        SimFlash {
            model: self.flash.clone(),
            _word: PhantomData,
        }
    }

    /// Bytes stored at chip addresses `range`.
    pub fn contents(&self, range: Range<u32>) -> Vec<u8> {
        let model = self.flash.borrow();
        model.mem[range.start as usize..range.end as usize]
            .iter()
            .map(|&b| b as u8)
            .collect()
    }

    pub fn corrupt(&self, address: u32, mask: u8) {
        self.flash.borrow_mut().mem[address as usize] ^= mask as u16;
    }

    pub fn events(&self) -> Vec<Event> {
        self.flash.borrow().events.clone()
    }
}

impl Default for SimIde {
    fn default() -> Self {
        Self::new()
    }
}
