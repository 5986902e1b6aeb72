//! # FdmHost Communication
//!
//! Serial transport and Marlin firmware support for FdmHost.
//! Owns the connection to the printer, the one-at-a-time command channel,
//! the background temperature monitor and the print job executor.

pub mod communication;
pub mod firmware;

pub use communication::{
    find_printer_port, is_usb_serial_port, list_ports, SerialPortInfo, SerialTransport,
    Transport, UsbSignature,
};

pub use firmware::marlin::{ControllerConfig, MarlinController, MarlinResponse, PauseMacro};
