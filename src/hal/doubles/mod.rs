//! Host test doubles for the bootloader's collaborators.

pub mod boot;
pub mod error;
pub mod flash;
pub mod serial;
