//! This sub-crate contains all definitions needed to generate the
//! board specific parts of the bootloader binary.
//!
//! NOTE: This code is not included anywhere from the bootloader itself! This
//! is a dependency of the bootloader **build script**. The build script
//! parses a RON configuration file into a [`Configuration`] and uses the
//! [`codegen`] module to emit the partition table and linker script that
//! the bootloader includes.

use anyhow::{bail, Result};
use memory::MemoryConfiguration;
use port::Port;
use serde::{Deserialize, Serialize};

pub mod codegen;
pub mod memory;
pub mod port;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Configuration {
    pub port: Port,
    pub memory_configuration: MemoryConfiguration,
}

impl Configuration {
    pub fn new(port: Port, memory_configuration: MemoryConfiguration) -> Self {
        Self { port, memory_configuration }
    }

    /// Cargo features that must be enabled for a binary built from this configuration.
    pub fn required_feature_flags(&self) -> impl Iterator<Item = &'static str> {
        [self.port.feature_flag(), self.port.family().feature_flag()].into_iter()
    }

    /// Rejects a flash area the port's MCU doesn't physically have.
    pub fn validate(&self) -> Result<()> {
        let physical = self.port.physical_flash();
        let flash = &self.memory_configuration.flash;
        if flash.origin < physical.origin || flash.end() > physical.end() {
            bail!(
                "Configured flash 0x{:08X}..0x{:08X} exceeds the {} part's flash 0x{:08X}..0x{:08X}",
                flash.origin,
                flash.end(),
                self.port,
                physical.origin,
                physical.end()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub const SAMPLE_CONFIGURATION: &str = r#"
(
    port: Stm32F429Discovery,
    memory_configuration: (
        flash: (origin: 0x08000000, size_kb: 2048),
        ram: (origin: 0x20000000, size_kb: 192),
        bootloader: (origin: 0x08000000, size_kb: 64),
        partitions: (
            config: (origin: 0x08010000, size: 16, first_sector: 4, sector_count: 1),
            app: (origin: 0x08020000, size: 262144, first_sector: 5, sector_count: 2),
            temp_slot_1: (origin: 0x08120000, size: 262144, first_sector: 17, sector_count: 2),
            temp_slot_2: (origin: 0x08160000, size: 262144, first_sector: 19, sector_count: 2),
        ),
    ),
)
"#;

    #[test]
    fn sample_configuration_parses_into_the_default_layout() {
        let configuration: Configuration = ron::from_str(SAMPLE_CONFIGURATION).unwrap();

        assert_eq!(configuration.port, Port::Stm32F429Discovery);
        let partitions = &configuration.memory_configuration.partitions;
        assert_eq!(partitions.config.origin, 0x0801_0000);
        assert_eq!(partitions.app.size, 256 * 1024);
        assert_eq!(partitions.temp_slot_2.first_sector, 19);
        assert_eq!(
            vec!["stm32f429_discovery", "stm32f4_any"],
            configuration.required_feature_flags().collect::<Vec<_>>()
        );
        assert!(configuration.validate().is_ok());
    }

    #[test]
    fn flash_larger_than_the_physical_part_is_rejected() {
        // Given
        let mut configuration: Configuration = ron::from_str(SAMPLE_CONFIGURATION).unwrap();
        configuration.memory_configuration.flash.size_kb = 4096;
        configuration.memory_configuration.partitions.app.origin = 0x0830_0000;

        // When
        let result = configuration.validate();

        // Then
        assert!(result.is_err());
        assert!(configuration.memory_configuration.partitions_out_of_bounds().next().is_none());
    }

    #[test]
    fn flash_below_the_physical_origin_is_rejected() {
        let mut configuration: Configuration = ron::from_str(SAMPLE_CONFIGURATION).unwrap();
        configuration.memory_configuration.flash.origin = 0x07FF_0000;
        assert!(configuration.validate().is_err());
    }
}
