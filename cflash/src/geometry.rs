//! Erase block layout of the 29F160, one 512K bank at a time.

use crate::chip::BootBlock;
use crate::error::{Error, Result};
use std::fmt;

pub const BANK_SIZE: u32 = 0x8_0000;
pub const BANK_COUNT: u8 = 4;
pub const BLOCK_SIZE: u32 = 0x1_0000;

/// Boot block sizes from the low end of the boot bank upwards.
const BOTTOM_BOOT_BLOCKS: [u32; 4] = [0x4000, 0x2000, 0x2000, 0x8000];
const TOP_BOOT_BLOCKS: [u32; 4] = [0x8000, 0x2000, 0x2000, 0x4000];

/// One of the four 512K banks of the flash.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bank(u8);

impl Bank {
    pub fn new(index: u8) -> Result<Self> {
        if index < BANK_COUNT {
            Ok(Bank(index))
        } else {
            Err(Error::InvalidBank(index))
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Flash address of the first byte in the bank.
    pub fn address(self) -> u32 {
        self.0 as u32 * BANK_SIZE
    }

    pub fn is_odd(self) -> bool {
        self.0 & 1 == 1
    }

    /// The even bank that starts this bank's pair.
    pub fn pair_base(self) -> Bank {
        Bank(self.0 & !1)
    }

    /// The bank above this one, if any.
    pub fn next(self) -> Option<Bank> {
        Bank::new(self.0 + 1).ok()
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An erase block, relative to the start of its bank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankGeometry {
    pub bank: Bank,
    pub blocks: Vec<Block>,
}

impl BankGeometry {
    pub fn resolve(boot: BootBlock, bank: Bank) -> Self {
        let sizes: Vec<u32> = match (boot, bank.index()) {
            (BootBlock::Bottom, 0) => BOTTOM_BOOT_BLOCKS
                .iter()
                .copied()
                .chain(uniform(BANK_SIZE - BLOCK_SIZE))
                .collect(),
            (BootBlock::Top, 3) => uniform(BANK_SIZE - BLOCK_SIZE)
                .chain(TOP_BOOT_BLOCKS.iter().copied())
                .collect(),
            _ => uniform(BANK_SIZE).collect(),
        };

        let mut offset = 0;
        let blocks = sizes
            .into_iter()
            .map(|size| {
                let block = Block { offset, size };
                offset += size;
                block
            })
            .collect();

        BankGeometry { bank, blocks }
    }

    /// Flash addresses of each block, in erase order.
    pub fn addresses(&self) -> impl Iterator<Item = u32> + '_ {
        let base = self.bank.address();
        self.blocks.iter().map(move |b| base + b.offset)
    }

    pub fn span(&self) -> u32 {
        self.blocks.iter().map(|b| b.size).sum()
    }
}

fn uniform(span: u32) -> impl Iterator<Item = u32> {
    std::iter::repeat(BLOCK_SIZE).take((span / BLOCK_SIZE) as usize)
}
