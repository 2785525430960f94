use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::memory::Area;

/// Boards the bootloader can be generated for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Port {
    Stm32F429Discovery,
}

/// MCU families, each with its own driver set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Family {
    Stm32F4,
}

impl Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Port::Stm32F429Discovery => "stm32f429_discovery",
        })
    }
}

impl Port {
    pub fn family(&self) -> Family {
        match self {
            Port::Stm32F429Discovery => Family::Stm32F4,
        }
    }

    /// Name of the cargo feature that selects this port.
    pub fn feature_flag(&self) -> &'static str {
        match self {
            Port::Stm32F429Discovery => "stm32f429_discovery",
        }
    }

    /// Flash physically present on the board's MCU.
    pub fn physical_flash(&self) -> Area {
        match self {
            Port::Stm32F429Discovery => Area { origin: 0x0800_0000, size_kb: 2048 },
        }
    }
}

impl Family {
    /// Name of the cargo feature that enables this family's drivers.
    pub fn feature_flag(&self) -> &'static str {
        match self {
            Family::Stm32F4 => "stm32f4_any",
        }
    }
}
