//! Hardware Abstraction Layer, containing interfaces
//! for the bootloader's collaborators.

pub mod boot;
pub mod flash;
pub mod serial;

#[cfg(not(target_arch = "arm"))]
#[doc(hidden)]
pub mod doubles;
