//! CRC-32/MPEG-2 checksum.
//!
//! The STM32F4 hardware CRC unit cannot be configured and always computes this
//! variant: polynomial 0x04C11DB7, initial value 0xFFFFFFFF, no input or output
//! reflection, no final XOR. The standard (reflected) CRC-32 does not match.

use crc::{CRC_32_MPEG_2, Crc};

static MPEG2: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Compute CRC-32/MPEG-2 over `data`.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    MPEG2.checksum(data)
}

/// Compute CRC-32/MPEG-2 over several slices as if they were concatenated.
pub fn crc32_mpeg2_parts(parts: &[&[u8]]) -> u32 {
    let mut digest = MPEG2.digest();
    for part in parts {
        digest.update(part);
    }
    digest.finalize()
}
