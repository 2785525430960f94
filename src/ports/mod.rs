//! Full project ports for specific targets. They mainly
//! provide a method to construct a generic bootloader from
//! specific parts.

#[cfg(feature = "stm32f429_discovery")]
port!(stm32f429_discovery: [bootloader, update_signal,]);
