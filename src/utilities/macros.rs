//! Convenience macros for the bootloader project

/// Define and export a specific port module (transparently pulls
/// its namespace to the current one).
///
/// Used mostly to conveniently fit the module declaration and reexport
/// under a single configuration flag.
///
/// # Example
/// ```ignore
/// #[cfg(feature = "stm32f429_discovery")]
/// port!(stm32f429_discovery: [bootloader, update_signal,]);
/// // Expands into:
/// pub mod stm32f429_discovery { pub mod bootloader; pub mod update_signal; }
/// pub use self::stm32f429_discovery::bootloader;
/// pub use self::stm32f429_discovery::update_signal;
/// ```
#[macro_export]
macro_rules! port {
    ($outer:ident: [$($inner:ident,)+]) => {
        pub mod $outer {
        $(
            pub mod $inner;
        )+
        }
        $(
            pub use self::$outer::$inner;
        )+
    };
}
