use crate::bus::Word;
use crate::chip::sst39sf010;
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const ROM_256K: u32 = 0x4_0000;
pub const ROM_512K: u32 = 0x8_0000;
pub const ROM_1M: u32 = 0x10_0000;

/// Data to be written to, or compared against, a flash device.
pub trait Source {
    /// Number of bytes the image covers on the flash.
    fn span(&self) -> u32;

    /// The unit destined for `offset`, which is below `span()`.
    fn unit<W: Word>(&self, offset: u32) -> W;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SizeClass {
    Rom256K,
    Rom512K,
    Rom1M,
}

impl SizeClass {
    pub fn from_len(len: usize) -> Result<Self> {
        match len as u64 {
            l if l == ROM_256K as u64 => Ok(SizeClass::Rom256K),
            l if l == ROM_512K as u64 => Ok(SizeClass::Rom512K),
            l if l == ROM_1M as u64 => Ok(SizeClass::Rom1M),
            _ => Err(Error::BadImageSize(len)),
        }
    }

    pub fn bytes(self) -> u32 {
        match self {
            SizeClass::Rom256K => ROM_256K,
            SizeClass::Rom512K => ROM_512K,
            SizeClass::Rom1M => ROM_1M,
        }
    }

    /// Bytes occupied on the flash; a 256K ROM is repeated to fill its bank.
    pub fn span(self) -> u32 {
        match self {
            SizeClass::Rom256K => ROM_512K,
            other => other.bytes(),
        }
    }
}

/// A Kickstart ROM image of one of the supported sizes.
#[derive(Clone, Debug)]
pub struct RomImage {
    size: SizeClass,
    data: Vec<u8>,
}

impl RomImage {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let size = SizeClass::from_len(data.len())?;
        Ok(RomImage { size, data })
    }

    pub fn size_class(&self) -> SizeClass {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn digest(&self) -> impl std::fmt::LowerHex {
        Sha256::digest(&self.data[..])
    }
}

impl Source for RomImage {
    fn span(&self) -> u32 {
        self.size.span()
    }

    fn unit<W: Word>(&self, offset: u32) -> W {
        let at = (offset % self.size.bytes()) as usize;
        W::from_be_slice(&self.data[at..])
    }
}

/// Boot ROM for the IDE controller, written byte by byte from offset 0.
#[derive(Clone, Debug)]
pub struct IdeImage {
    data: Vec<u8>,
}

impl IdeImage {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let capacity = sst39sf010::CAPACITY as usize;
        if data.len() > capacity {
            return Err(Error::ImageTooLarge {
                size: data.len(),
                capacity,
            });
        }
        Ok(IdeImage { data })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let size = fs::metadata(path)?.len() as usize;
        let capacity = sst39sf010::CAPACITY as usize;
        // check the size before pulling the whole file in
        if size > capacity {
            return Err(Error::ImageTooLarge { size, capacity });
        }
        Self::from_bytes(fs::read(path)?)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Source for IdeImage {
    fn span(&self) -> u32 {
        self.data.len() as u32
    }

    fn unit<W: Word>(&self, offset: u32) -> W {
        W::from_be_slice(&self.data[offset as usize..])
    }
}
