//! Flash collaborator interface.
use core::{
    fmt,
    ops::{Add, Sub},
};

/// Absolute address in the memory-mapped flash space.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct Address(pub u32);

impl Add<usize> for Address {
    type Output = Address;
    fn add(self, rhs: usize) -> Self::Output { Address(self.0 + rhs as u32) }
}

impl Sub<usize> for Address {
    type Output = Address;
    fn sub(self, rhs: usize) -> Self::Output { Address(self.0.saturating_sub(rhs as u32)) }
}

impl Sub<Address> for Address {
    type Output = usize;
    fn sub(self, rhs: Address) -> Self::Output { self.0.saturating_sub(rhs.0) as usize }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self { address.0 as usize }
}

/// Reads a range of bytes from memory-mapped flash.
///
/// Implementations must perform volatile reads: a read issued after an
/// erase or program must observe its effect, and reads must not be
/// cached or reordered across those operations.
pub trait Read {
    type Error: Clone + Copy + fmt::Debug;
    fn read(&mut self, address: Address, bytes: &mut [u8]) -> nb::Result<(), Self::Error>;
    /// Physical flash range, end exclusive.
    fn range(&self) -> (Address, Address);
}

/// NOR flash programming primitives. Programming can only clear bits,
/// so a region must be erased before it's written.
pub trait Program: Read {
    /// Erases `count` hardware sectors starting at `first`.
    fn erase_sectors(&mut self, first: u8, count: u8) -> nb::Result<(), Self::Error>;
    fn program_word(&mut self, address: Address, word: u32) -> nb::Result<(), Self::Error>;
    fn program_byte(&mut self, address: Address, byte: u8) -> nb::Result<(), Self::Error>;
}
