//! Driver implementations for all supported platforms.

#[cfg(feature = "stm32f4_any")]
pub mod stm32f4 {
    pub mod flash;
    pub mod serial;
}
