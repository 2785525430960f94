use std::fmt::Write;

use crate::Configuration;

/// Renders the linker script `memory.x`, which describes the amount and location
/// of flash and RAM memory available to the bootloader binary.
///
/// The bootloader links into its own area only, so the flash region is the
/// bootloader area rather than the whole bank.
pub fn render(configuration: &Configuration) -> String {
    let memory = &configuration.memory_configuration;
    let mut script = String::new();
    // Writing to a `String` can't fail.
    let _ = write!(
        script,
        "MEMORY\n\
         {{\n\
             FLASH : ORIGIN = 0x{:08X}, LENGTH = {}K\n\
             RAM : ORIGIN = 0x{:08X}, LENGTH = {}K\n\
         }}\n",
        memory.bootloader.origin, memory.bootloader.size_kb, memory.ram.origin, memory.ram.size_kb,
    );
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::{Area, MemoryConfiguration},
        port::Port,
    };

    #[test]
    fn linker_script_describes_bootloader_area_and_ram() {
        let configuration = Configuration::new(Port::Stm32F429Discovery, MemoryConfiguration {
            flash: Area { origin: 0x0800_0000, size_kb: 2048 },
            ram: Area { origin: 0x2000_0000, size_kb: 192 },
            bootloader: Area { origin: 0x0800_0000, size_kb: 64 },
            ..Default::default()
        });

        assert_eq!(
            render(&configuration),
            "MEMORY\n{\nFLASH : ORIGIN = 0x08000000, LENGTH = 64K\nRAM : ORIGIN = 0x20000000, LENGTH = 192K\n}\n"
        );
    }
}
