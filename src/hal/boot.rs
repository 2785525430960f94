//! Terminal control transfer into application code.
use super::flash::Address;

/// The two leading words of a Cortex-M vector table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct VectorTable {
    pub initial_stack_pointer: u32,
    pub reset_handler: u32,
}

pub trait Jump {
    /// Hands the core over to the image whose vector table lives at `location`.
    ///
    /// # Safety
    ///
    /// This leaves the bootloader for good. Nothing about the target code is
    /// checked here; the image at `location` must have been validated first.
    unsafe fn jump(&mut self, location: Address, vectors: VectorTable) -> !;
}
