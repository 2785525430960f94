//! Flash partition layout.
//!
//! The layout is fixed at build time from the board configuration file,
//! and checked once at startup before anything touches flash.
use crate::{error::Error, hal::flash::Address};
use static_assertions::const_assert;

/// Region of flash backed by whole hardware erase sectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct PartitionRegion {
    pub name: &'static str,
    pub location: Address,
    /// Size in bytes.
    pub size: usize,
    pub first_sector: u8,
    pub sector_count: u8,
}

/// One of the two interchangeable staging partitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum StagingSlot {
    One,
    Two,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PartitionMap {
    /// Installed image metadata.
    pub config: PartitionRegion,
    /// Region executed at boot.
    pub app: PartitionRegion,
    pub temp_slots: [PartitionRegion; 2],
}

mod generated {
    use super::*;
    include!(concat!(env!("OUT_DIR"), "/partitions.rs"));
}
pub use generated::{BOOTLOADER_REGION, FLASH_REGION, PARTITION_MAP};

const_assert!(PARTITION_MAP.config.size >= 16);
const_assert!(PARTITION_MAP.app.location.0 % 4 == 0);

impl PartitionRegion {
    /// First address past the region.
    pub fn end(&self) -> Address { self.location + self.size }

    fn overlaps(&self, location: Address, size: usize) -> bool {
        self.location < location + size && location < self.end()
    }
}

impl StagingSlot {
    pub fn index(self) -> usize {
        match self {
            StagingSlot::One => 0,
            StagingSlot::Two => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(StagingSlot::One),
            1 => Some(StagingSlot::Two),
            _ => None,
        }
    }
}

impl PartitionMap {
    pub fn staging(&self, slot: StagingSlot) -> &PartitionRegion { &self.temp_slots[slot.index()] }

    pub fn regions(&self) -> [&PartitionRegion; 4] {
        [&self.config, &self.app, &self.temp_slots[0], &self.temp_slots[1]]
    }

    /// Checks that every region lies inside `flash_range` (end exclusive),
    /// is word aligned, and shares no flash with another region or with
    /// the bootloader itself.
    pub fn validate(
        &self,
        flash_range: (Address, Address),
        bootloader: (Address, usize),
    ) -> Result<(), Error> {
        let (start, end) = flash_range;
        let regions = self.regions();

        if let Some(region) = regions
            .iter()
            .find(|r| r.location < start || r.size > end - r.location || r.size == 0)
        {
            return Err(Error::PartitionOutOfBounds(region.name));
        }

        if regions.iter().any(|r| r.location.0 % 4 != 0) {
            return Err(Error::ConfigurationError("Partitions must be word aligned"));
        }

        if self.config.size < 16 {
            return Err(Error::ConfigurationError("Config partition can't hold image metadata"));
        }

        let (bootloader_location, bootloader_size) = bootloader;
        if let Some(region) = regions.iter().find(|r| r.overlaps(bootloader_location, bootloader_size)) {
            return Err(Error::PartitionOverlap(region.name, "BOOTLOADER"));
        }

        for (index, a) in regions.iter().enumerate() {
            if let Some(b) = regions[index + 1..].iter().find(|b| a.overlaps(b.location, b.size)) {
                return Err(Error::PartitionOverlap(a.name, b.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FLASH: (Address, Address) = (Address(0x0800_0000), Address(0x0820_0000));
    const BOOTLOADER: (Address, usize) = (Address(0x0800_0000), kb!(64));

    #[test]
    fn configured_map_is_valid() {
        assert_eq!(PARTITION_MAP.validate(FLASH_REGION, BOOTLOADER_REGION), Ok(()));
        assert_eq!(PARTITION_MAP.validate(FLASH, BOOTLOADER), Ok(()));
    }

    #[test]
    fn app_extending_past_flash_end_is_rejected() {
        // Given
        let mut map = PARTITION_MAP;
        map.app.location = Address(0x081F_0000);
        map.app.size = kb!(256);

        // When
        let result = map.validate(FLASH, BOOTLOADER);

        // Then
        assert_eq!(result, Err(Error::PartitionOutOfBounds("APP")));
    }

    #[test]
    fn region_before_flash_start_is_rejected() {
        let mut map = PARTITION_MAP;
        map.config.location = Address(0x07FF_FFF0);
        assert_eq!(map.validate(FLASH, BOOTLOADER), Err(Error::PartitionOutOfBounds("CONFIG")));
    }

    #[test]
    fn region_ending_exactly_at_flash_end_is_accepted() {
        let mut map = PARTITION_MAP;
        map.temp_slots[1].location = FLASH.1 - map.temp_slots[1].size;
        assert_eq!(map.validate(FLASH, BOOTLOADER), Ok(()));
    }

    #[test]
    fn overlapping_staging_slots_are_rejected() {
        let mut map = PARTITION_MAP;
        map.temp_slots[1].location = map.temp_slots[0].location + kb!(128);
        assert_eq!(
            map.validate(FLASH, BOOTLOADER),
            Err(Error::PartitionOverlap("TEMP_SLOT_1", "TEMP_SLOT_2"))
        );
    }

    #[test]
    fn partitions_inside_the_bootloader_are_rejected() {
        let mut map = PARTITION_MAP;
        map.config.location = Address(0x0800_8000);
        assert_eq!(
            map.validate(FLASH, BOOTLOADER),
            Err(Error::PartitionOverlap("CONFIG", "BOOTLOADER"))
        );
    }

    #[test]
    fn staging_slots_are_addressed_by_index() {
        assert_eq!(PARTITION_MAP.staging(StagingSlot::Two), &PARTITION_MAP.temp_slots[1]);
        assert_eq!(StagingSlot::from_index(0), Some(StagingSlot::One));
        assert_eq!(StagingSlot::from_index(2), None);
    }
}
