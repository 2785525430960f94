//! # SBP Bootloader Library
//!
//! This crate contains all functionality for the serial
//! field-update bootloader in library form: the Simple
//! Bootloader Protocol, the CRC engine, the flash slot
//! manager and the board ports that wire them together.
#![cfg_attr(test, allow(unused_imports))]
#![cfg_attr(target_arch = "arm", no_std)]

#[cfg(all(target_arch = "arm", feature = "stm32f429"))]
pub use stm32f4::stm32f429 as stm32pac;

extern crate static_assertions;

#[macro_use]
pub mod utilities {
    #[macro_use]
    pub mod log;
    #[macro_use]
    pub mod memory;
    #[macro_use]
    mod macros;
}

pub mod devices;
pub mod error;
pub mod hal;

#[cfg(all(target_arch = "arm", feature = "stm32f4_any"))]
pub mod drivers;

#[cfg(all(target_arch = "arm", feature = "stm32f429_discovery"))]
pub mod ports;
