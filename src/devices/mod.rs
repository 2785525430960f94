//! Complex modules with business logic related to the problem
//! domain, that lay on top of abstract drivers. Devices are
//! generic, while board specifics (pins, board config) are
//! handled in the `ports` module.

pub mod bootloader;
pub mod crc;
pub mod partition;
pub mod protocol;
pub mod slots;
pub mod update_signal;

/// General purpose traits that summarize requirements on devices.
pub mod traits {
    use crate::{
        error,
        hal::{flash, serial},
    };
    use marker_blanket::marker_blanket;

    /// A supported flash must be able to read, erase, program, and report
    /// errors to the bootloader.
    #[marker_blanket]
    pub trait Flash: flash::Program + flash::Read<Error: error::Convertible> {}

    /// A supported serial must be able to read, write, and report errors
    /// to the bootloader.
    #[marker_blanket]
    pub trait Serial:
        serial::Read<Error: error::Convertible> + serial::Write<Error: error::Convertible>
    {
    }
}
