use super::error::FakeSerialError;
use crate::hal::serial;
use std::collections::VecDeque;

/// Serial port fed from a scripted byte queue, recording everything written.
#[derive(Debug, Default)]
pub struct FakeSerial {
    input: VecDeque<u8>,
    output: Vec<u8>,
    writes_to_fail: usize,
}

impl FakeSerial {
    pub fn new() -> Self { Self::default() }

    pub fn queue(&mut self, bytes: &[u8]) { self.input.extend(bytes) }

    pub fn fail_writes(&mut self) { self.writes_to_fail = usize::MAX }

    /// Only the next byte write fails.
    pub fn fail_next_write(&mut self) { self.writes_to_fail = 1 }

    pub fn pending_input(&self) -> usize { self.input.len() }

    /// Drains everything written so far.
    pub fn take_output(&mut self) -> Vec<u8> { std::mem::take(&mut self.output) }
}

impl serial::Read for FakeSerial {
    type Error = FakeSerialError;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.input.pop_front().ok_or(nb::Error::Other(FakeSerialError::Exhausted))
    }
}

impl serial::Write for FakeSerial {
    type Error = FakeSerialError;

    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        if self.writes_to_fail > 0 {
            self.writes_to_fail -= 1;
            return Err(nb::Error::Other(FakeSerialError::Injected));
        }
        self.output.push(byte);
        Ok(())
    }
}
