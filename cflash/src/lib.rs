mod config;
mod error;
mod flasher;
mod ide;
mod verify;

pub mod board;
pub mod bus;
pub mod chip;
pub mod geometry;
pub mod image;
pub mod protocol;
pub mod sim;

pub use config::Config;
pub use error::{Error, ErrorKind, Mismatch, Result};
pub use flasher::{identify, plan, Failure, Flasher, ProgramOperation, ProgramPlan, Stage};
pub use ide::IdeFlasher;
pub use verify::verify;
