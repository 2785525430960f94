use super::error::FakeFlashError;
use crate::hal::flash::{self, Address};

/// Sector layout of a dual bank 2MB STM32F42x/F43x part.
pub const SECTOR_SIZES: [usize; 24] = [
    kb!(16), kb!(16), kb!(16), kb!(16), kb!(64), kb!(128), kb!(128), kb!(128),
    kb!(128), kb!(128), kb!(128), kb!(128),
    kb!(16), kb!(16), kb!(16), kb!(16), kb!(64), kb!(128), kb!(128), kb!(128),
    kb!(128), kb!(128), kb!(128), kb!(128),
];

pub const FLASH_BASE: Address = Address(0x0800_0000);
const ERASED: u8 = 0xFF;

/// In-memory NOR flash. Programming ANDs into the existing contents,
/// and only a sector erase sets bits back to one.
pub struct FakeFlash {
    base: Address,
    data: Vec<u8>,
    programs: usize,
    erased_sectors: Vec<u8>,
    programs_before_failure: Option<usize>,
    fail_erases: bool,
}

impl Default for FakeFlash {
    fn default() -> Self { Self::new(FLASH_BASE) }
}

impl FakeFlash {
    pub fn new(base: Address) -> FakeFlash {
        FakeFlash {
            base,
            data: vec![ERASED; SECTOR_SIZES.iter().sum()],
            programs: 0,
            erased_sectors: Vec::new(),
            programs_before_failure: None,
            fail_erases: false,
        }
    }

    /// Every program call after the next `count` ones fails.
    pub fn fail_programs_after(&mut self, count: usize) { self.programs_before_failure = Some(count) }

    pub fn fail_erases(&mut self) { self.fail_erases = true }

    /// Number of successful program calls (bytes and words).
    pub fn program_count(&self) -> usize { self.programs }

    /// Sectors erased so far, in erase order.
    pub fn erased_sectors(&self) -> &[u8] { &self.erased_sectors }

    /// Writes `bytes` directly, bypassing NOR semantics and fault injection.
    pub fn load(&mut self, address: Address, bytes: &[u8]) {
        let offset = address - self.base;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn contents(&self, address: Address, length: usize) -> &[u8] {
        let offset = address - self.base;
        &self.data[offset..offset + length]
    }

    fn sector_span(sector: u8) -> Option<(usize, usize)> {
        let sector = sector as usize;
        let size = *SECTOR_SIZES.get(sector)?;
        Some((SECTOR_SIZES[..sector].iter().sum(), size))
    }

    fn offset(&self, address: Address, length: usize) -> Result<usize, FakeFlashError> {
        let offset = address.0.checked_sub(self.base.0).ok_or(FakeFlashError::OutOfRange)? as usize;
        if offset + length > self.data.len() {
            return Err(FakeFlashError::OutOfRange);
        }
        Ok(offset)
    }

    fn before_program(&mut self) -> Result<(), FakeFlashError> {
        match self.programs_before_failure {
            Some(0) => Err(FakeFlashError::Injected),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl flash::Read for FakeFlash {
    type Error = FakeFlashError;

    fn read(&mut self, address: Address, bytes: &mut [u8]) -> nb::Result<(), Self::Error> {
        let offset = self.offset(address, bytes.len())?;
        bytes.copy_from_slice(&self.data[offset..offset + bytes.len()]);
        Ok(())
    }

    fn range(&self) -> (Address, Address) { (self.base, self.base + self.data.len()) }
}

impl flash::Program for FakeFlash {
    fn erase_sectors(&mut self, first: u8, count: u8) -> nb::Result<(), Self::Error> {
        if self.fail_erases {
            return Err(nb::Error::Other(FakeFlashError::Injected));
        }
        for sector in first..first.saturating_add(count) {
            let (start, size) = Self::sector_span(sector).ok_or(FakeFlashError::OutOfRange)?;
            self.data[start..start + size].iter_mut().for_each(|b| *b = ERASED);
            self.erased_sectors.push(sector);
        }
        Ok(())
    }

    fn program_word(&mut self, address: Address, word: u32) -> nb::Result<(), Self::Error> {
        if address.0 % 4 != 0 {
            return Err(nb::Error::Other(FakeFlashError::Misaligned));
        }
        let offset = self.offset(address, 4)?;
        self.before_program()?;
        self.data[offset..offset + 4]
            .iter_mut()
            .zip(word.to_le_bytes())
            .for_each(|(cell, byte)| *cell &= byte);
        self.programs += 1;
        Ok(())
    }

    fn program_byte(&mut self, address: Address, byte: u8) -> nb::Result<(), Self::Error> {
        let offset = self.offset(address, 1)?;
        self.before_program()?;
        self.data[offset] &= byte;
        self.programs += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::flash::{Program, Read};

    #[test]
    fn fake_flash_covers_two_megabytes_starting_erased() {
        let mut flash = FakeFlash::default();
        let mut bytes = [0u8; 4];

        flash.read(Address(0x081F_FFFC), &mut bytes).unwrap();

        assert_eq!(flash.range(), (Address(0x0800_0000), Address(0x0820_0000)));
        assert_eq!(bytes, [0xFF; 4]);
    }

    #[test]
    fn programming_only_clears_bits_until_erased() {
        // Given
        let mut flash = FakeFlash::default();
        let address = Address(0x0802_0000);
        flash.program_word(address, 0x0000_FF0F).unwrap();

        // When
        flash.program_word(address, 0x1234_56F0).unwrap();
        let mut bytes = [0u8; 4];
        flash.read(address, &mut bytes).unwrap();

        // Then
        assert_eq!(u32::from_le_bytes(bytes), 0x0000_5600);

        // When
        flash.erase_sectors(5, 1).unwrap();
        flash.read(address, &mut bytes).unwrap();

        // Then
        assert_eq!(bytes, [0xFF; 4]);
    }

    #[test]
    fn erasing_touches_only_the_requested_sectors() {
        let mut flash = FakeFlash::default();
        flash.program_byte(Address(0x0811_FFFF), 0x00).unwrap(); // sector 11
        flash.program_byte(Address(0x0812_0000), 0x00).unwrap(); // sector 17

        flash.erase_sectors(17, 2).unwrap();

        assert_eq!(flash.contents(Address(0x0811_FFFF), 2), &[0x00, 0xFF]);
        assert_eq!(flash.erased_sectors(), &[17, 18]);
    }

    #[test]
    fn injected_program_failures_kick_in_after_the_configured_count() {
        let mut flash = FakeFlash::default();
        flash.fail_programs_after(1);

        assert!(flash.program_byte(Address(0x0802_0000), 0).is_ok());
        assert_eq!(
            flash.program_byte(Address(0x0802_0001), 0),
            Err(nb::Error::Other(FakeFlashError::Injected))
        );
        assert_eq!(flash.program_count(), 1);
    }
}
