//! Read-back comparison of flash contents against a source image.

use crate::bus::{Bus, Word};
use crate::chip::Chip;
use crate::error::{Error, Mismatch, Result};
use crate::flasher::get_bar;
use crate::image::Source;
use crate::protocol::{Completion, FlashDevice};

/// Compares `source.span()` bytes starting at data address `base` with the
/// source, one unit at a time, and stops at the first difference.
///
/// Sources shorter than their span (a 256K ROM in a 512K bank) are compared
/// against every repetition.
pub fn verify<C, B, P, S>(
    device: &mut FlashDevice<C, B, P>,
    source: &S,
    base: u32,
    progress: bool,
) -> Result<()>
where
    C: Chip,
    B: Bus<C::Word>,
    P: Completion,
    S: Source,
{
    let span = source.span();
    let stride = C::Word::BYTES;
    let bar = get_bar(span as u64, progress);

    for offset in (0..span).step_by(stride as usize) {
        let expected: C::Word = source.unit(offset);
        let actual = device.read(base + offset);
        if expected != actual {
            bar.abandon();
            return Err(Error::VerifyMismatch(Mismatch {
                address: base + offset,
                expected: expected.into(),
                actual: actual.into(),
                width: stride,
            }));
        }
        bar.inc(stride as u64);
    }
    bar.finish_and_clear();

    Ok(())
}
