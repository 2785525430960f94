//! Internal Flash controller for the STM32F42x/F43x family
use crate::{
    devices::partition::BOOTLOADER_REGION,
    error::{Convertible, Error as BootloaderError},
    hal::flash::{Address, Program, Read},
    stm32pac::FLASH,
};
use core::ptr;

/// From section 3.6.1 of the reference manual (RM0090)
const UNLOCK_KEYS: [u32; 2] = [0x4567_0123, 0xCDEF_89AB];

/// Physical flash of the 2MB STM32F42xxI/F43xxI parts, end exclusive.
/// Independent of the flash area in the board configuration.
const PHYSICAL_FLASH: (Address, Address) = (Address(0x0800_0000), Address(0x0820_0000));

/// Sectors per bank. Bank 2 sector numbers are encoded with bit 4 set.
const SECTORS_PER_BANK: u8 = 12;
const SECTOR_COUNT: u8 = 2 * SECTORS_PER_BANK;

mod cr {
    pub const PG: u32 = 1 << 0;
    pub const SER: u32 = 1 << 1;
    pub const SNB_SHIFT: u32 = 3;
    pub const PSIZE_SHIFT: u32 = 8;
    pub const PSIZE_X8: u32 = 0b00 << PSIZE_SHIFT;
    pub const PSIZE_X32: u32 = 0b10 << PSIZE_SHIFT;
    pub const STRT: u32 = 1 << 16;
    pub const LOCK: u32 = 1 << 31;
}

mod sr {
    pub const EOP: u32 = 1 << 0;
    pub const OPERR: u32 = 1 << 1;
    pub const WRPERR: u32 = 1 << 4;
    pub const PGAERR: u32 = 1 << 5;
    pub const PGPERR: u32 = 1 << 6;
    pub const PGSERR: u32 = 1 << 7;
    pub const RDERR: u32 = 1 << 8;
    pub const BSY: u32 = 1 << 16;
    pub const ERRORS: u32 = OPERR | WRPERR | PGAERR | PGPERR | PGSERR | RDERR;
}

pub struct McuFlash {
    flash: FLASH,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Error {
    MemoryNotReachable,
    MisalignedAccess,
    SectorInvalid,
    WriteProtection,
    ProgrammingSequence,
    Operation,
}

impl Convertible for Error {
    fn into(self) -> BootloaderError {
        BootloaderError::ProgramError(match self {
            Error::MemoryNotReachable => "MCU flash memory not reachable",
            Error::MisalignedAccess => "MCU flash memory access misaligned",
            Error::SectorInvalid => "MCU flash sector doesn't exist",
            Error::WriteProtection => "MCU flash sector is write protected",
            Error::ProgrammingSequence => "MCU flash programming sequence error",
            Error::Operation => "MCU flash operation failed",
        })
    }
}

impl McuFlash {
    pub fn new(flash: FLASH) -> Self { Self { flash } }

    fn is_busy(&self) -> bool { self.flash.sr.read().bits() & sr::BSY != 0 }

    fn unlock(&mut self) {
        if self.flash.cr.read().bits() & cr::LOCK != 0 {
            // NOTE(Safety): Unsafe block to use the 'bits' convenience function.
            // Applies to all blocks in this file unless specified otherwise
            self.flash.keyr.write(|w| unsafe { w.bits(UNLOCK_KEYS[0]) });
            self.flash.keyr.write(|w| unsafe { w.bits(UNLOCK_KEYS[1]) });
        }
    }

    fn lock(&mut self) { self.flash.cr.write(|w| unsafe { w.bits(cr::LOCK) }); }

    /// Waits for the running operation, then reports and clears its error flags.
    fn finish(&mut self) -> Result<(), Error> {
        while self.is_busy() {}
        let status = self.flash.sr.read().bits();
        self.flash.sr.write(|w| unsafe { w.bits(sr::ERRORS | sr::EOP) });
        self.lock();
        match status & sr::ERRORS {
            0 => Ok(()),
            e if e & sr::WRPERR != 0 => Err(Error::WriteProtection),
            e if e & (sr::PGAERR | sr::PGPERR | sr::PGSERR) != 0 => Err(Error::ProgrammingSequence),
            _ => Err(Error::Operation),
        }
    }

    /// Clears stale error flags and unlocks the controller for one operation.
    fn start(&mut self) -> nb::Result<(), Error> {
        if self.is_busy() {
            return Err(nb::Error::WouldBlock);
        }
        self.flash.sr.write(|w| unsafe { w.bits(sr::ERRORS | sr::EOP) });
        self.unlock();
        Ok(())
    }

    fn is_programmable(address: Address, length: usize) -> bool {
        let (start, end) = PHYSICAL_FLASH;
        let (bootloader, bootloader_size) = BOOTLOADER_REGION;
        let inside_flash = address >= start && length <= end - address;
        let inside_bootloader = address < bootloader + bootloader_size;
        inside_flash && !inside_bootloader
    }

    fn program(&mut self, size: u32, write: impl FnOnce()) -> nb::Result<(), Error> {
        self.start()?;
        self.flash.cr.write(|w| unsafe { w.bits(size | cr::PG) });
        write();
        self.finish()?;
        Ok(())
    }
}

impl Read for McuFlash {
    type Error = Error;

    fn read(&mut self, address: Address, bytes: &mut [u8]) -> nb::Result<(), Self::Error> {
        let (start, end) = PHYSICAL_FLASH;
        if address < start || bytes.len() > end - address {
            return Err(nb::Error::Other(Error::MemoryNotReachable));
        }
        let base = address.0 as *const u8;
        for (index, byte) in bytes.iter_mut().enumerate() {
            // NOTE(Safety): The range was checked to be inside the memory
            // mapped flash. Volatile reads guarantee erases and programs
            // issued through `&mut self` are observed.
            *byte = unsafe { ptr::read_volatile(base.add(index)) };
        }
        Ok(())
    }

    fn range(&self) -> (Address, Address) { PHYSICAL_FLASH }
}

impl Program for McuFlash {
    fn erase_sectors(&mut self, first: u8, count: u8) -> nb::Result<(), Self::Error> {
        let last = first.checked_add(count).ok_or(nb::Error::Other(Error::SectorInvalid))?;
        if last > SECTOR_COUNT {
            return Err(nb::Error::Other(Error::SectorInvalid));
        }
        for sector in first..last {
            let number = u32::from(if sector < SECTORS_PER_BANK { sector } else { sector + 4 });
            self.start()?;
            let erase = cr::PSIZE_X32 | cr::SER | (number << cr::SNB_SHIFT);
            self.flash.cr.write(|w| unsafe { w.bits(erase) });
            self.flash.cr.write(|w| unsafe { w.bits(erase | cr::STRT) });
            self.finish()?;
        }
        Ok(())
    }

    fn program_word(&mut self, address: Address, word: u32) -> nb::Result<(), Self::Error> {
        if address.0 % 4 != 0 {
            return Err(nb::Error::Other(Error::MisalignedAccess));
        }
        if !Self::is_programmable(address, 4) {
            return Err(nb::Error::Other(Error::MemoryNotReachable));
        }
        // NOTE(Safety): Writing to a memory-mapped flash directly is
        // naturally unsafe. The address was checked to be outside the
        // bootloader and inside flash.
        self.program(cr::PSIZE_X32, || unsafe {
            ptr::write_volatile(address.0 as *mut u32, word)
        })
    }

    fn program_byte(&mut self, address: Address, byte: u8) -> nb::Result<(), Self::Error> {
        if !Self::is_programmable(address, 1) {
            return Err(nb::Error::Other(Error::MemoryNotReachable));
        }
        self.program(cr::PSIZE_X8, || unsafe {
            ptr::write_volatile(address.0 as *mut u8, byte)
        })
    }
}
