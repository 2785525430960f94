//! Logging macros.
//!
//! On target, messages go through `defmt` (over RTT, never the update
//! UART). On host builds they go through the `log` facade so tests and
//! tools can capture them.

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {{
        #[cfg(target_arch = "arm")]
        ::defmt::debug!($($arg)+);
        #[cfg(not(target_arch = "arm"))]
        ::log::debug!($($arg)+);
    }};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {{
        #[cfg(target_arch = "arm")]
        ::defmt::info!($($arg)+);
        #[cfg(not(target_arch = "arm"))]
        ::log::info!($($arg)+);
    }};
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {{
        #[cfg(target_arch = "arm")]
        ::defmt::warn!($($arg)+);
        #[cfg(not(target_arch = "arm"))]
        ::log::warn!($($arg)+);
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {{
        #[cfg(target_arch = "arm")]
        ::defmt::error!($($arg)+);
        #[cfg(not(target_arch = "arm"))]
        ::log::error!($($arg)+);
    }};
}
