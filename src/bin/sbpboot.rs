#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]

#[cfg(target_arch = "arm")]
use defmt_rtt as _;
#[cfg(target_arch = "arm")]
use panic_probe as _;

#[cfg(target_arch = "arm")]
#[cortex_m_rt::entry]
fn main() -> ! { sbpboot_lib::ports::bootloader::run() }

#[cfg(not(target_arch = "arm"))]
fn main() {}
