//! CRC32/MPEG-2 integrity checks.
//!
//! Non reflected, polynomial `0x04C11DB7`, seeded with `0xFFFFFFFF`
//! and no final XOR. Packet payloads are checked from RAM and images
//! from flash, and both paths must agree for the same bytes.
use crate::{
    hal::flash::{self, Address},
    utilities::memory::chunks,
};
use ::crc::{Crc, CRC_32_MPEG_2};
use nb::block;

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Bytes read from flash per step when streaming a region through the digest.
const FLASH_CHUNK_SIZE: usize = 256;

pub fn crc32_from_memory(bytes: &[u8]) -> u32 { CRC32.checksum(bytes) }

/// CRC of `length` bytes of flash starting at `location`.
pub fn crc32_from_flash<F: flash::Read>(
    flash: &mut F,
    location: Address,
    length: usize,
) -> Result<u32, F::Error> {
    let mut digest = CRC32.digest();
    let mut buffer = [0u8; FLASH_CHUNK_SIZE];
    for (offset, size) in chunks(length, FLASH_CHUNK_SIZE) {
        let chunk = &mut buffer[..size];
        block!(flash.read(location + offset, chunk))?;
        digest.update(chunk);
    }
    Ok(digest.finalize())
}
