use serde::{Deserialize, Serialize};

#[macro_export(local_inner_macros)]
macro_rules! KB {
    ($val:expr) => {
        $val * 1024
    };
}

/// Contiguous memory area, used for linker script generation.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub origin: u32,
    pub size_kb: u32,
}

impl Area {
    pub fn end(&self) -> u64 { self.origin as u64 + KB!(self.size_kb as u64) }
}

/// Flash partition, described by its location and the
/// hardware erase sectors that back it.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub origin: u32,
    /// Size in bytes.
    pub size: u32,
    pub first_sector: u8,
    pub sector_count: u8,
}

impl Partition {
    pub fn end(&self) -> u64 { self.origin as u64 + self.size as u64 }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfiguration {
    pub config: Partition,
    pub app: Partition,
    pub temp_slot_1: Partition,
    pub temp_slot_2: Partition,
}

impl PartitionConfiguration {
    pub fn named(&self) -> [(&'static str, &Partition); 4] {
        [
            ("CONFIG", &self.config),
            ("APP", &self.app),
            ("TEMP_SLOT_1", &self.temp_slot_1),
            ("TEMP_SLOT_2", &self.temp_slot_2),
        ]
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfiguration {
    pub flash: Area,
    pub ram: Area,
    /// Flash area occupied by the bootloader binary itself.
    pub bootloader: Area,
    pub partitions: PartitionConfiguration,
}

impl MemoryConfiguration {
    /// Names of the partitions that don't fit in the flash area.
    ///
    /// These are reported as build warnings only: an out of bounds
    /// partition map must still be caught at runtime, where it halts
    /// the bootloader before it touches flash.
    pub fn partitions_out_of_bounds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.partitions
            .named()
            .into_iter()
            .filter(move |(_, p)| {
                (p.origin as u64) < self.flash.origin as u64 || p.end() > self.flash.end()
            })
            .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(origin: u32, size: u32) -> Partition {
        Partition { origin, size, first_sector: 0, sector_count: 1 }
    }

    #[test]
    fn partitions_past_the_end_of_flash_are_reported() {
        // Given
        let memory = MemoryConfiguration {
            flash: Area { origin: 0x0800_0000, size_kb: 1024 },
            ram: Area { origin: 0x2000_0000, size_kb: 128 },
            bootloader: Area { origin: 0x0800_0000, size_kb: 64 },
            partitions: PartitionConfiguration {
                config: partition(0x0801_0000, 16),
                app: partition(0x080F_0000, KB!(256)),
                temp_slot_1: partition(0x0802_0000, KB!(128)),
                temp_slot_2: partition(0x0804_0000, KB!(128)),
            },
        };

        // When
        let reported: Vec<_> = memory.partitions_out_of_bounds().collect();

        // Then
        assert_eq!(reported, vec!["APP"]);
    }
}
