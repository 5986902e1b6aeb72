//! Device transport layer
//!
//! The controller never talks to a serial port directly. It owns one
//! [`Transport`], which makes the whole protocol stack testable against a
//! scripted in-memory device.

pub mod serial;

use std::io;
use std::time::Duration;

pub use serial::{
    find_printer_port, is_usb_serial_port, list_ports, SerialPortInfo, SerialTransport,
    UsbSignature,
};

/// Byte-oriented duplex serial device with line framing
///
/// Device-level faults (cable pulled, broken pipe) are reported as
/// `io::Error` and trigger the reconnection policy upstream.
pub trait Transport: Send {
    /// Enumerate serial devices that could be opened
    fn available_ports(&self) -> io::Result<Vec<SerialPortInfo>>;

    /// Open `port` at `baud_rate`, closing any previously open device
    fn open(&mut self, port: &str, baud_rate: u32) -> io::Result<()>;

    /// Check if a device is currently open
    fn is_open(&self) -> bool;

    /// Drive the DTR control line (used for the hardware reset pulse)
    fn set_dtr(&mut self, level: bool) -> io::Result<()>;

    /// Discard pending input and output
    fn clear_buffers(&mut self) -> io::Result<()>;

    /// Write one command followed by a newline and flush it
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Read one response line, waiting at most `timeout`
    ///
    /// Returns `Ok(None)` when no complete line arrived in time. The
    /// returned line has its terminator and surrounding whitespace removed.
    fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>>;

    /// Close the device; closing a closed transport is a no-op
    fn close(&mut self);
}
