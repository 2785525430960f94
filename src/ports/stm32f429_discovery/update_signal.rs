//! Update mode entry through the discovery board's user button.
use crate::{
    devices::update_signal::{ReadUpdateSignal, UpdatePlan},
    stm32pac::{GPIOA, GPIOG, RCC},
};

/// How long the button is polled after reset.
const WINDOW_MS: u32 = 3000;
/// Core cycles per millisecond on the reset clock (HSI, 16MHz).
const CYCLES_PER_MS: u32 = 16_000;

const BUTTON_PIN: u32 = 0; // PA0
const LED_PIN: u32 = 14; // PG14, red

/// Update is requested by holding the user button during the first
/// seconds after reset. The red LED is lit while the window is open.
pub struct ButtonSignal {
    gpioa: GPIOA,
    gpiog: GPIOG,
}

impl ButtonSignal {
    pub fn new(rcc: &RCC, gpioa: GPIOA, gpiog: GPIOG) -> Self {
        // NOTE(Safety): Unsafe blocks to use the 'bits' convenience function.
        // Only the bits for the pins owned here are touched.
        rcc.ahb1enr.modify(|r, w| unsafe { w.bits(r.bits() | (1 << 0) | (1 << 6)) });
        gpioa.moder.modify(|r, w| unsafe { w.bits(r.bits() & !(0b11 << (2 * BUTTON_PIN))) });
        gpiog.moder.modify(|r, w| unsafe {
            w.bits((r.bits() & !(0b11 << (2 * LED_PIN))) | (0b01 << (2 * LED_PIN)))
        });
        Self { gpioa, gpiog }
    }

    fn is_pressed(&self) -> bool { self.gpioa.idr.read().bits() & (1 << BUTTON_PIN) != 0 }

    fn set_led(&self, on: bool) {
        let bit = if on { 1 << LED_PIN } else { 1 << (LED_PIN + 16) };
        self.gpiog.bsrr.write(|w| unsafe { w.bits(bit) });
    }
}

impl ReadUpdateSignal for ButtonSignal {
    fn read_update_plan(&self) -> UpdatePlan {
        self.set_led(true);
        for _ in 0..WINDOW_MS {
            if self.is_pressed() {
                info!("Update requested");
                return UpdatePlan::Update;
            }
            cortex_m::asm::delay(CYCLES_PER_MS);
        }
        self.set_led(false);
        UpdatePlan::Boot
    }
}
