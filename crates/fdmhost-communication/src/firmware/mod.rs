//! Firmware implementations
//!
//! Supported firmware:
//! - Marlin: the stock firmware on Creality Ender printers

pub mod marlin;
