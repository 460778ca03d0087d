//! Raw access to memory-mapped devices.
//!
//! Everything that dereferences a hardware address lives in this module.
//! Drivers above it only see [`Bus`], which takes byte offsets relative to
//! the start of a device's window.

use byteorder::{BigEndian, ByteOrder};
use std::fmt::{Debug, UpperHex};
use std::marker::PhantomData;
use std::ptr;

/// Data unit transferred on a flash bus: a 16-bit word for the kickstart
/// flash, a single byte for the IDE flash.
pub trait Word: Copy + Eq + From<u8> + Into<u16> + Debug + UpperHex + 'static {
    /// Bytes per unit, also the stride between consecutive units of an image.
    const BYTES: u32;

    /// Builds a unit from the start of `bytes`, most significant byte first.
    fn from_be_slice(bytes: &[u8]) -> Self;

    /// Keeps the low `BYTES` bytes of `value`.
    fn truncate(value: u16) -> Self;

    /// DQ6, the toggle bit.
    fn toggle_bit(self) -> bool {
        let value: u16 = self.into();
        value & (1 << 6) != 0
    }
}

impl Word for u16 {
    const BYTES: u32 = 2;

    fn from_be_slice(bytes: &[u8]) -> Self {
        BigEndian::read_u16(bytes)
    }

    fn truncate(value: u16) -> Self {
        value
    }
}

impl Word for u8 {
    const BYTES: u32 = 1;

    fn from_be_slice(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn truncate(value: u16) -> Self {
        value as u8
    }
}

/// Read/write primitive for one device window.
pub trait Bus<W: Word> {
    fn read(&mut self, offset: u32) -> W;
    fn write(&mut self, offset: u32, value: W);
}

impl<W: Word, B: Bus<W> + ?Sized> Bus<W> for &mut B {
    fn read(&mut self, offset: u32) -> W {
        (**self).read(offset)
    }

    fn write(&mut self, offset: u32, value: W) {
        (**self).write(offset, value)
    }
}

/// A window of the physical address space accessed with volatile loads and
/// stores.
pub struct Mmio<W> {
    base: usize,
    len: u32,
    _word: PhantomData<W>,
}

impl<W: Word> Mmio<W> {
    /// # Safety
    ///
    /// `base..base + len` must be mapped device memory (or RAM/ROM) that
    /// nothing else accesses while this value exists, and `base` must be
    /// aligned for `W`.
    pub unsafe fn new(base: usize, len: u32) -> Self {
        Mmio {
            base,
            len,
            _word: PhantomData,
        }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    fn addr(&self, offset: u32) -> usize {
        debug_assert!(offset < self.len, "offset {:#x} outside window", offset);
        self.base + (offset % self.len) as usize
    }
}

impl<W: Word> Bus<W> for Mmio<W> {
    fn read(&mut self, offset: u32) -> W {
        // Safety: the constructor's contract covers every address in the window.
        unsafe { ptr::read_volatile(self.addr(offset) as *const W) }
    }

    fn write(&mut self, offset: u32, value: W) {
        // Safety: as above.
        unsafe { ptr::write_volatile(self.addr(offset) as *mut W, value) }
    }
}

/// Copies `len` bytes out of a word bus, most significant byte first.
pub fn read_words<B: Bus<u16> + ?Sized>(bus: &mut B, len: u32) -> Vec<u8> {
    let mut data = vec![0u8; len as usize];
    for (i, chunk) in data.chunks_exact_mut(2).enumerate() {
        BigEndian::write_u16(chunk, bus.read(i as u32 * 2));
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pattern;

    impl Bus<u16> for Pattern {
        fn read(&mut self, offset: u32) -> u16 {
            0x1000 | offset as u16
        }

        fn write(&mut self, _offset: u32, _value: u16) {}
    }

    #[test]
    fn words_are_big_endian() {
        assert_eq!(u16::from_be_slice(&[0x11, 0x22]), 0x1122);
        assert_eq!(u8::from_be_slice(&[0x33, 0x44]), 0x33);
    }

    #[test]
    fn toggle_bit_is_dq6() {
        assert!(0x40u16.toggle_bit());
        assert!(!0xBFu8.toggle_bit());
    }

    #[test]
    fn read_words_keeps_byte_order() {
        assert_eq!(read_words(&mut Pattern, 4), vec![0x10, 0x00, 0x10, 0x02]);
    }

    #[test]
    fn mmio_reads_and_writes_memory() {
        let mut backing = vec![0u16; 8];
        let mut bus = unsafe { Mmio::<u16>::new(backing.as_mut_ptr() as usize, 16) };
        bus.write(4, 0xBEEF);
        assert_eq!(bus.read(4), 0xBEEF);
        drop(bus);
        assert_eq!(backing[2], 0xBEEF);
    }
}
