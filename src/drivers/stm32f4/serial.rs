//! UART5 driver on PC12 (TX) and PD2 (RX), polled, 8N1.
use crate::{
    error::{Convertible, Error as BootloaderError},
    hal::serial,
    stm32pac::{GPIOC, GPIOD, RCC, UART5},
};

/// Bus clock feeding UART5 when running from the internal oscillator.
const HSI_FREQUENCY_HZ: u32 = 16_000_000;
pub const BAUD_RATE: u32 = 115_200;
const ALTERNATE_FUNCTION: u32 = 8;

mod enable {
    pub const AHB1ENR_GPIOCEN: u32 = 1 << 2;
    pub const AHB1ENR_GPIODEN: u32 = 1 << 3;
    pub const APB1ENR_UART5EN: u32 = 1 << 20;
}

mod status {
    pub const PE: u32 = 1 << 0;
    pub const FE: u32 = 1 << 1;
    pub const NF: u32 = 1 << 2;
    pub const ORE: u32 = 1 << 3;
    pub const RXNE: u32 = 1 << 5;
    pub const TXE: u32 = 1 << 7;
}

mod control {
    pub const RE: u32 = 1 << 2;
    pub const TE: u32 = 1 << 3;
    pub const UE: u32 = 1 << 13;
}

/// Serial error
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Framing error
    Framing,
    /// Noise error
    Noise,
    /// RX buffer overrun
    Overrun,
    /// Parity check error
    Parity,
}

impl Convertible for Error {
    fn into(self) -> BootloaderError {
        BootloaderError::TransportError(match self {
            Error::Framing => "UART framing error",
            Error::Noise => "UART noise error",
            Error::Overrun => "UART overrun",
            Error::Parity => "UART parity error",
        })
    }
}

pub struct Uart5 {
    uart: UART5,
}

/// Rounded USARTDIV for 16x oversampling, which is also the BRR value.
const fn baud_rate_divisor(clock: u32, baud_rate: u32) -> u32 { (clock + baud_rate / 2) / baud_rate }

impl Uart5 {
    /// Routes the pins to the peripheral and enables it.
    pub fn new(uart: UART5, rcc: &RCC, gpioc: &GPIOC, gpiod: &GPIOD) -> Self {
        // NOTE(Safety): Unsafe blocks to use the 'bits' convenience function.
        // Only the bits for the pins and peripherals owned here are touched.
        rcc.ahb1enr.modify(|r, w| unsafe {
            w.bits(r.bits() | enable::AHB1ENR_GPIOCEN | enable::AHB1ENR_GPIODEN)
        });
        rcc.apb1enr.modify(|r, w| unsafe { w.bits(r.bits() | enable::APB1ENR_UART5EN) });

        // PC12, alternate function mode, AF8
        gpioc.moder.modify(|r, w| unsafe { w.bits((r.bits() & !(0b11 << 24)) | (0b10 << 24)) });
        gpioc.afrh.modify(|r, w| unsafe {
            w.bits((r.bits() & !(0xF << 16)) | (ALTERNATE_FUNCTION << 16))
        });
        // PD2, alternate function mode, AF8
        gpiod.moder.modify(|r, w| unsafe { w.bits((r.bits() & !(0b11 << 4)) | (0b10 << 4)) });
        gpiod.afrl.modify(|r, w| unsafe {
            w.bits((r.bits() & !(0xF << 8)) | (ALTERNATE_FUNCTION << 8))
        });

        uart.brr.write(|w| unsafe { w.bits(baud_rate_divisor(HSI_FREQUENCY_HZ, BAUD_RATE)) });
        uart.cr1.write(|w| unsafe { w.bits(control::UE | control::TE | control::RE) });
        Self { uart }
    }
}

impl serial::Read for Uart5 {
    type Error = Error;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let sr = self.uart.sr.read().bits();
        let error = if sr & status::PE != 0 {
            Some(Error::Parity)
        } else if sr & status::FE != 0 {
            Some(Error::Framing)
        } else if sr & status::NF != 0 {
            Some(Error::Noise)
        } else if sr & status::ORE != 0 {
            Some(Error::Overrun)
        } else {
            None
        };

        if let Some(error) = error {
            // Error flags clear on a status read followed by a data read
            let _ = self.uart.dr.read();
            Err(nb::Error::Other(error))
        } else if sr & status::RXNE != 0 {
            Ok(self.uart.dr.read().bits() as u8)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl serial::Write for Uart5 {
    type Error = Error;

    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        if self.uart.sr.read().bits() & status::TXE != 0 {
            self.uart.dr.write(|w| unsafe { w.bits(byte as u32) });
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

static_assertions::const_assert_eq!(baud_rate_divisor(HSI_FREQUENCY_HZ, BAUD_RATE), 0x8B);
