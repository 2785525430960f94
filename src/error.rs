//! Bootloader error types and methods

use core::fmt;

/// Top level error type for the bootloader. Driver and device errors
/// are converted into it, and each variant belongs to one [`ErrorKind`]
/// that decides how the bootloader reacts to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Error {
    /// Error caused by a faulty configuration
    ConfigurationError(&'static str),
    /// A partition extends outside the physical flash range
    PartitionOutOfBounds(&'static str),
    /// Two partitions (or a partition and the bootloader) share flash
    PartitionOverlap(&'static str, &'static str),
    /// Error caused by the byte transport
    TransportError(&'static str),
    /// Error caused by a flash erase or program operation
    ProgramError(&'static str),
    /// Start of frame byte didn't match
    FrameInvalid,
    PacketTypeUnknown(u8),
    PacketLengthInvalid(u16),
    PacketCrcInvalid,
    /// Host response was malformed
    ResponseInvalid,
    /// Region contents don't match the expected CRC
    CrcInvalid,
    /// Declared image size is zero or larger than its region
    ImageSizeInvalid,
    /// Image doesn't live where the operation requires it to
    ImageLocationInvalid,
    /// Write would run past the end of the staging slot
    StagingOverflow,
}

/// Classification of errors by the reaction they require.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum ErrorKind {
    /// Fatal, the bootloader refuses to proceed.
    Configuration,
    Transport,
    Integrity,
    /// Refused before anything is written.
    Bounds,
    /// Affected region may be left partially written.
    Program,
}

pub trait Convertible {
    fn into(self) -> Error;
}
impl<T: Convertible> From<T> for Error {
    fn from(t: T) -> Self { t.into() }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigurationError(_)
            | Error::PartitionOutOfBounds(_)
            | Error::PartitionOverlap(_, _) => ErrorKind::Configuration,
            Error::TransportError(_)
            | Error::FrameInvalid
            | Error::PacketTypeUnknown(_)
            | Error::ResponseInvalid => ErrorKind::Transport,
            Error::PacketCrcInvalid | Error::CrcInvalid => ErrorKind::Integrity,
            Error::PacketLengthInvalid(_)
            | Error::ImageSizeInvalid
            | Error::ImageLocationInvalid
            | Error::StagingOverflow => ErrorKind::Bounds,
            Error::ProgramError(_) => ErrorKind::Program,
        }
    }

    /// Reports the error through the log collaborator.
    pub fn report(&self) {
        error!("[{:?} Error] -> {:?}", self.kind(), self);
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigurationError(text) => write!(f, "[Configuration Error] -> {}", text),
            Error::PartitionOutOfBounds(name) => {
                write!(f, "[Configuration Error] -> Partition {} is outside flash", name)
            }
            Error::PartitionOverlap(a, b) => {
                write!(f, "[Configuration Error] -> Partitions {} and {} overlap", a, b)
            }
            Error::TransportError(text) => write!(f, "[Transport Error] -> {}", text),
            Error::ProgramError(text) => write!(f, "[Program Error] -> {}", text),
            Error::FrameInvalid => write!(f, "[Transport Error] -> Invalid start of frame"),
            Error::PacketTypeUnknown(t) => {
                write!(f, "[Transport Error] -> Unknown packet type 0x{:02X}", t)
            }
            Error::PacketLengthInvalid(length) => {
                write!(f, "[Bounds Error] -> Invalid packet length {}", length)
            }
            Error::PacketCrcInvalid => write!(f, "[Integrity Error] -> Packet CRC is invalid"),
            Error::ResponseInvalid => write!(f, "[Transport Error] -> Malformed response"),
            Error::CrcInvalid => write!(f, "[Integrity Error] -> Image CRC is invalid"),
            Error::ImageSizeInvalid => write!(f, "[Bounds Error] -> Image size is invalid"),
            Error::ImageLocationInvalid => {
                write!(f, "[Bounds Error] -> Image is in the wrong partition")
            }
            Error::StagingOverflow => write!(f, "[Bounds Error] -> Staging slot overflow"),
        }
    }
}

#[cfg(not(target_arch = "arm"))]
impl std::error::Error for Error {}
