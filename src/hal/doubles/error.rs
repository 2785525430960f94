use crate::error::{Convertible, Error};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FakeFlashError {
    OutOfRange,
    Misaligned,
    /// Injected through the fault configuration of the fake.
    Injected,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FakeSerialError {
    /// No more scripted input.
    Exhausted,
    Injected,
}

impl Convertible for FakeFlashError {
    fn into(self) -> Error {
        Error::ProgramError(match self {
            FakeFlashError::OutOfRange => "Fake flash access out of range [TESTING ONLY]",
            FakeFlashError::Misaligned => "Fake flash access misaligned [TESTING ONLY]",
            FakeFlashError::Injected => "A fake flash error occurred [TESTING ONLY]",
        })
    }
}

impl Convertible for FakeSerialError {
    fn into(self) -> Error {
        Error::TransportError(match self {
            FakeSerialError::Exhausted => "Fake serial ran out of input [TESTING ONLY]",
            FakeSerialError::Injected => "A fake serial error occurred [TESTING ONLY]",
        })
    }
}
