//! Bootloader construction for the stm32f429 discovery board.
use super::update_signal::ButtonSignal;
use crate::{
    devices::{
        bootloader::{self, halt},
        partition::PARTITION_MAP,
    },
    drivers::stm32f4::{flash::McuFlash, serial::Uart5},
    error::Error,
    hal::{
        boot::{Jump, VectorTable},
        flash::Address,
    },
    stm32pac,
};
use cortex_m::peripheral::SCB;

/// Hands the core to an application through its vector table.
pub struct CortexMJump {
    scb: SCB,
}

impl CortexMJump {
    pub fn new(scb: SCB) -> Self { Self { scb } }
}

impl Jump for CortexMJump {
    unsafe fn jump(&mut self, location: Address, vectors: VectorTable) -> ! {
        cortex_m::interrupt::disable();
        self.scb.vtor.write(location.0);
        cortex_m::asm::bootstrap(
            vectors.initial_stack_pointer as *const u32,
            vectors.reset_handler as *const u32,
        )
    }
}

/// Takes the peripherals, builds every collaborator and runs the bootloader.
pub fn run() -> ! {
    let (peripherals, cortex_peripherals) =
        match (stm32pac::Peripherals::take(), cortex_m::Peripherals::take()) {
            (Some(peripherals), Some(cortex_peripherals)) => (peripherals, cortex_peripherals),
            _ => halt(Error::ConfigurationError("Peripherals already taken")),
        };

    info!("SBP bootloader {}", env!("CARGO_PKG_VERSION"));
    let rcc = &peripherals.RCC;
    let signal = ButtonSignal::new(rcc, peripherals.GPIOA, peripherals.GPIOG);
    let serial = Uart5::new(peripherals.UART5, rcc, &peripherals.GPIOC, &peripherals.GPIOD);
    let flash = McuFlash::new(peripherals.FLASH);
    let jump = CortexMJump::new(cortex_peripherals.SCB);

    bootloader::run(flash, serial, jump, &signal, PARTITION_MAP)
}
