use crate::hal::{
    boot::{Jump, VectorTable},
    flash::Address,
};

/// Stands in for the control transfer by panicking with a description
/// of the jump, so tests can assert on it with `should_panic`.
#[derive(Debug, Default)]
pub struct FakeJump;

impl Jump for FakeJump {
    unsafe fn jump(&mut self, location: Address, vectors: VectorTable) -> ! {
        panic!(
            "jump: location=0x{:08X} sp=0x{:08X} reset=0x{:08X}",
            location.0, vectors.initial_stack_pointer, vectors.reset_handler
        )
    }
}
