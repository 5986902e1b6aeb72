//! Error handling for FdmHost
//!
//! Provides the error taxonomy shared by every layer of the print host:
//! - Connection errors (discovery, handshake, device faults)
//! - Protocol errors (firmware rejected a command, no acknowledgment)
//! - Job errors (loading, starting, aborting a print)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Printer error type
///
/// A unified error type covering the connection manager, the command
/// channel and the print job executor. This is the primary error type used
/// in public APIs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrinterError {
    /// No serial device matched the printer signature or the generic
    /// USB-serial naming patterns
    #[error("No printer found. Check USB connection.")]
    NoDeviceFound,

    /// The device did not identify itself as printer firmware
    #[error("Printer not responding to identification on {port}")]
    HandshakeFailed {
        /// The port the handshake was attempted on.
        port: String,
        /// Whatever the device sent during the handshake window.
        response: String,
    },

    /// The controller has no live connection
    #[error("Not connected to printer")]
    NotConnected,

    /// A device-level I/O fault (unplugged cable, broken pipe, ...)
    #[error("USB I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },

    /// The firmware answered with an error token
    #[error("Printer reported an error: {}", .response.trim())]
    Protocol {
        /// The accumulated response text up to and including the error line.
        response: String,
    },

    /// No acknowledgment arrived within the timeout
    #[error("Timeout after {timeout_ms}ms waiting for acknowledgment")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// A job is already running
    #[error("Already printing")]
    AlreadyPrinting,

    /// Nothing to print
    #[error("No G-code loaded")]
    NoJob,

    /// The reconnection budget of a job was exhausted
    #[error("Too many connection errors ({attempts}), stopping print")]
    TooManyReconnects {
        /// Number of consecutive connection-class failures.
        attempts: u32,
    },

    /// The serial port could not be enumerated or opened
    #[error("Failed to open port {port}: {reason}")]
    Port {
        /// The port name.
        port: String,
        /// The reason the port failed.
        reason: String,
    },

    /// A G-code job could not be loaded
    #[error("Failed to load G-code: {reason}")]
    Job {
        /// The reason the job failed to load.
        reason: String,
    },
}

impl PrinterError {
    /// Build an I/O error from a device fault
    pub fn io(err: &std::io::Error) -> Self {
        PrinterError::Io {
            reason: err.to_string(),
        }
    }

    /// Check if this error means the link to the device is unusable
    ///
    /// These failures count against a job's reconnection budget.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, PrinterError::Io { .. } | PrinterError::NotConnected)
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, PrinterError::Timeout { .. })
    }

    /// Check if this is a firmware-reported error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, PrinterError::Protocol { .. })
    }
}

impl From<std::io::Error> for PrinterError {
    fn from(err: std::io::Error) -> Self {
        PrinterError::io(&err)
    }
}

/// Result type using PrinterError
pub type Result<T> = std::result::Result<T, PrinterError>;
