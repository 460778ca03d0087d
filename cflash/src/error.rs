use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Parse toml error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Bad file size {0}, 256K/512K/1M ROM required")]
    BadImageSize(usize),
    #[error("File too large to fit IDE ROM: {size} bytes, {capacity} available")]
    ImageTooLarge { size: usize, capacity: usize },
    #[error("Invalid bank {0}, banks 0-3 exist")]
    InvalidBank(u8),
    #[error("Invalid slot {0}, only slots 0 and 1 exist")]
    InvalidSlot(u8),
    #[error("Unknown flash device manufacturer: {manufacturer:04X} device: {device:04X}")]
    UnknownDevice { manufacturer: u16, device: u16 },
    #[error("Bonus RAM must be disabled to program flash")]
    OverlayEnabled,
    #[error("Verification failed at {0}")]
    VerifyMismatch(Mismatch),
    #[error("ROM-resident image is not available on this board")]
    ResidentRomUnavailable,
    #[error("No {0} address configured")]
    MissingAddress(&'static str),
}

/// How an operation failed, as reported to the command line layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any hardware access.
    Validation,
    /// The device did not answer with a known id, or the board is not in a
    /// state where the flash is visible.
    Identification,
    /// Flash contents differ from the source after programming.
    Verification,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::IO(_) => ErrorKind::Io,
            Error::TomlError(_)
            | Error::BadImageSize(_)
            | Error::ImageTooLarge { .. }
            | Error::InvalidBank(_)
            | Error::InvalidSlot(_)
            | Error::ResidentRomUnavailable
            | Error::MissingAddress(_) => ErrorKind::Validation,
            Error::UnknownDevice { .. } | Error::OverlayEnabled => ErrorKind::Identification,
            Error::VerifyMismatch(_) => ErrorKind::Verification,
        }
    }
}

/// First differing unit found by verification.
///
/// `expected` and `actual` hold a word for the kickstart flash and a byte
/// (zero extended) for the IDE flash; `width` is the unit size in bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub address: u32,
    pub expected: u16,
    pub actual: u16,
    pub width: u32,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.width as usize * 2;
        write!(
            f,
            "{:06x} - Expected {:0digits$X} but read {:0digits$X}",
            self.address,
            self.expected,
            self.actual,
            digits = digits
        )
    }
}
