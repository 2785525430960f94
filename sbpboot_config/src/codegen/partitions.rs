use std::fmt::Write;

use crate::{memory::Partition, Configuration};

/// Renders the partition table module. The result is `include!`d by the
/// bootloader, where it must resolve against `PartitionRegion`,
/// `PartitionMap` and `Address` being in scope.
pub fn render(configuration: &Configuration) -> String {
    let memory = &configuration.memory_configuration;
    let partitions = &memory.partitions;
    let mut code = String::from("// Generated by the build script from the board configuration file.\n\n");

    // Writing to a `String` can't fail.
    let _ = writeln!(
        code,
        "/// Flash area occupied by the bootloader binary.\n\
         pub const BOOTLOADER_REGION: (Address, usize) = (Address(0x{:08X}), {});\n",
        memory.bootloader.origin,
        memory.bootloader.size_kb as usize * 1024,
    );
    let _ = writeln!(
        code,
        "/// Flash bank as configured for this board, end exclusive.\n\
         pub const FLASH_REGION: (Address, Address) = (Address(0x{:08X}), Address(0x{:08X}));\n",
        memory.flash.origin,
        memory.flash.end(),
    );
    let _ = writeln!(
        code,
        "/// Partition layout for this board.\n\
         pub const PARTITION_MAP: PartitionMap = PartitionMap {{\n    \
             config: {},\n    \
             app: {},\n    \
             temp_slots: [{}, {}],\n\
         }};",
        region("CONFIG", &partitions.config),
        region("APP", &partitions.app),
        region("TEMP_SLOT_1", &partitions.temp_slot_1),
        region("TEMP_SLOT_2", &partitions.temp_slot_2),
    );
    code
}

fn region(name: &str, partition: &Partition) -> String {
    format!(
        "PartitionRegion {{ name: \"{}\", location: Address(0x{:08X}), size: {}, first_sector: {}, sector_count: {} }}",
        name, partition.origin, partition.size, partition.first_sector, partition.sector_count
    )
}
