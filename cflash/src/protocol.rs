//! JEDEC-style command set shared by both flash parts.
//!
//! Every destructive command is preceded by the two-write software data
//! protection unlock. Completion is detected with the DQ6 toggle bit: while an
//! embedded program or erase algorithm runs, DQ6 flips on every read.

use crate::bus::{Bus, Word};
use crate::chip::{Chip, DeviceIds};
use std::hint;
use std::marker::PhantomData;

/// Offsets read in ID mode.
const ID_MANUFACTURER: u32 = 0;
const ID_DEVICE: u32 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    UnlockStep1,
    UnlockStep2,
    EraseSetup,
    EraseChip,
    EraseBlock,
    Program,
    IdEntry,
    IdExit,
    ReadReset,
}

impl Command {
    pub const fn code(self) -> u8 {
        match self {
            Command::UnlockStep1 => 0xAA,
            Command::UnlockStep2 => 0x55,
            Command::EraseSetup => 0x80,
            Command::EraseChip => 0x10,
            Command::EraseBlock => 0x30,
            Command::Program => 0xA0,
            Command::IdEntry => 0x90,
            Command::IdExit | Command::ReadReset => 0xF0,
        }
    }
}

/// Strategy for waiting on an embedded algorithm.
///
/// `settled` is re-evaluated until it returns true. Implementations decide
/// what happens between attempts; the default spins forever, as the hardware
/// offers no other completion signal.
pub trait Completion {
    fn wait_until(&mut self, settled: &mut dyn FnMut() -> bool);
}

/// Busy-wait with no deadline.
#[derive(Copy, Clone, Debug, Default)]
pub struct Spin;

impl Completion for Spin {
    fn wait_until(&mut self, settled: &mut dyn FnMut() -> bool) {
        while !settled() {
            hint::spin_loop();
        }
    }
}

/// Exclusive handle on one flash device.
pub struct FlashDevice<C: Chip, B, P = Spin> {
    bus: B,
    completion: P,
    _chip: PhantomData<C>,
}

impl<C, B> FlashDevice<C, B>
where
    C: Chip,
    B: Bus<C::Word>,
{
    pub fn new(bus: B) -> Self {
        Self::with_completion(bus, Spin)
    }
}

impl<C, B, P> FlashDevice<C, B, P>
where
    C: Chip,
    B: Bus<C::Word>,
    P: Completion,
{
    pub fn with_completion(bus: B, completion: P) -> Self {
        FlashDevice {
            bus,
            completion,
            _chip: PhantomData,
        }
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Sends the SDP unlock sequence.
    pub fn unlock(&mut self) {
        self.write_code(C::CMD_ADDR_1, Command::UnlockStep1);
        self.write_code(C::CMD_ADDR_2, Command::UnlockStep2);
    }

    /// Writes a command code to the command address.
    pub fn command(&mut self, command: Command) {
        self.write_code(C::CMD_ADDR_1, command);
    }

    /// Reads the manufacturer and device ids, leaving the device in read mode.
    pub fn identify(&mut self) -> DeviceIds {
        self.unlock();
        self.command(Command::IdEntry);
        let manufacturer: C::Word = self.bus.read(ID_MANUFACTURER);
        let device: C::Word = self.bus.read(ID_DEVICE);
        self.command(Command::IdExit);

        let ids = DeviceIds {
            manufacturer: manufacturer.into(),
            device: device.into(),
        };
        log::debug!(
            "{} ids: manufacturer {:04X} device {:04X}",
            C::NAME,
            ids.manufacturer,
            ids.device
        );
        ids
    }

    /// Returns the device to read mode.
    pub fn reset(&mut self) {
        self.command(Command::ReadReset);
    }

    /// Programs one unit and waits for the device to finish.
    ///
    /// `address` wraps to the device window.
    pub fn program(&mut self, address: u32, data: C::Word) {
        let offset = self.data_offset(address);
        self.unlock();
        self.command(Command::Program);
        self.bus.write(offset, data);
        self.poll(offset);
    }

    pub fn erase_chip(&mut self) {
        self.unlock();
        self.command(Command::EraseSetup);
        self.unlock();
        self.command(Command::EraseChip);
        self.poll(0);
    }

    /// Erases the block containing `address`.
    pub fn erase_block(&mut self, address: u32) {
        let offset = self.data_offset(address);
        self.unlock();
        self.command(Command::EraseSetup);
        self.unlock();
        self.write_code(offset, Command::EraseBlock);
        self.poll(offset);
    }

    /// Reads one unit in read mode.
    pub fn read(&mut self, address: u32) -> C::Word {
        let offset = self.data_offset(address);
        self.bus.read(offset)
    }

    fn poll(&mut self, offset: u32) {
        let bus = &mut self.bus;
        self.completion.wait_until(&mut || {
            let first: C::Word = bus.read(offset);
            let second: C::Word = bus.read(offset);
            first.toggle_bit() == second.toggle_bit()
        });
    }

    fn data_offset(&self, address: u32) -> u32 {
        (address << C::DATA_SHIFT) & (C::WINDOW - 1)
    }

    fn write_code(&mut self, offset: u32, command: Command) {
        self.bus.write(offset, C::Word::from(command.code()));
    }
}
