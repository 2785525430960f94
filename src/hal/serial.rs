//! Byte transport collaborator interface.
use nb::block;

/// Serial read half
pub trait Read {
    type Error: Copy + core::fmt::Debug;

    /// Reads a single byte
    fn read(&mut self) -> nb::Result<u8, Self::Error>;
}

/// Serial write half
pub trait Write {
    type Error: Copy + core::fmt::Debug;

    /// Writes a single byte
    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error>;
}

/// Blocking, whole-buffer transfers on top of the per-byte interface.
/// Both calls wait without timeout until every byte has been moved.
pub trait Transport: Read + Write {
    /// Fills `buffer` completely, or fails.
    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), <Self as Read>::Error> {
        for byte in buffer.iter_mut() {
            *byte = block!(self.read())?;
        }
        Ok(())
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), <Self as Write>::Error> {
        for &byte in bytes {
            block!(self.write(byte))?;
        }
        Ok(())
    }
}

impl<T: Read + Write> Transport for T {}
