//! Serial port communication implementation
//!
//! Provides the production [`Transport`] on top of the `serialport` crate,
//! plus port enumeration and printer discovery.
//!
//! Supports:
//! - Port enumeration with USB vendor/product details
//! - Discovery by USB signature with a naming-pattern fallback
//! - DTR reset pulses
//! - Line-framed reads with a short poll timeout

use super::Transport;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Unterminated input kept while waiting for a newline
const MAX_PENDING_BYTES: usize = 4096;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// USB identity of the printer's serial bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbSignature {
    /// USB vendor ID
    pub vid: u16,
    /// USB product ID
    pub pid: u16,
    /// Case-insensitive fragment of the port description
    pub description: String,
}

impl Default for UsbSignature {
    /// The CH340 bridge fitted to Creality mainboards
    fn default() -> Self {
        Self {
            vid: 0x1a86,
            pid: 0x7523,
            description: "ch340".to_string(),
        }
    }
}

impl UsbSignature {
    /// Check if a port carries this signature
    pub fn matches(&self, port: &SerialPortInfo) -> bool {
        if port.vid == Some(self.vid) && port.pid == Some(self.pid) {
            return true;
        }

        !self.description.is_empty()
            && port
                .description
                .to_ascii_lowercase()
                .contains(&self.description.to_ascii_lowercase())
    }
}

/// List available serial ports on the system
pub fn list_ports() -> io::Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports.iter().map(to_port_info).collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(e.into())
        }
    }
}

/// Pick the printer's port out of an enumeration
///
/// A port carrying `signature` wins; otherwise the first port whose name
/// looks like a USB-serial adapter.
pub fn find_printer_port(ports: &[SerialPortInfo], signature: &UsbSignature) -> Option<String> {
    ports
        .iter()
        .find(|port| signature.matches(port))
        .or_else(|| ports.iter().find(|port| is_usb_serial_port(&port.port_name)))
        .map(|port| port.port_name.clone())
}

/// Check if a port name matches USB-serial adapter patterns
///
/// Valid patterns:
/// - Windows: COM* (COM1, COM2, etc.)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn is_usb_serial_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn to_port_info(port: &serialport::SerialPortInfo) -> SerialPortInfo {
    let info = SerialPortInfo::new(&port.port_name, get_port_description(port));

    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            let mut info = info.with_usb_ids(usb_info.vid, usb_info.pid);
            if let Some(ref mfg) = usb_info.manufacturer {
                info = info.with_manufacturer(mfg);
            }
            if let Some(ref serial) = usb_info.serial_number {
                info = info.with_serial_number(serial);
            }
            info
        }
        _ => info,
    }
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Real serial port transport using the serialport crate
pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: Option<String>,
    /// Bytes received but not yet terminated by a newline
    pending: Vec<u8>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self {
            port: None,
            name: None,
            pending: Vec::new(),
            read_timeout: Duration::from_millis(10),
            write_timeout: Duration::from_secs(2),
        }
    }

    /// Name of the open port
    pub fn port_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port not open"))
    }

    /// Pop the next complete, non-blank line out of the receive buffer
    fn take_line(&mut self) -> Option<String> {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// Append received bytes and pop the next line
    ///
    /// A run of input longer than [`MAX_PENDING_BYTES`] with no newline is
    /// discarded.
    fn buffer_bytes(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);
        let line = self.take_line();
        if self.pending.len() > MAX_PENDING_BYTES && !self.pending.contains(&b'\n') {
            tracing::warn!(
                "Discarding {} bytes of unterminated input",
                self.pending.len()
            );
            self.pending.clear();
        }
        line
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SerialTransport {
    fn available_ports(&self) -> io::Result<Vec<SerialPortInfo>> {
        list_ports()
    }

    fn open(&mut self, port: &str, baud_rate: u32) -> io::Result<()> {
        self.close();

        let opened = serialport::new(port, baud_rate)
            .timeout(self.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", port, e);
                io::Error::from(e)
            })?;

        self.port = Some(opened);
        self.name = Some(port.to_string());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        self.port_mut()?
            .write_data_terminal_ready(level)
            .map_err(io::Error::from)
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.port_mut()?
            .clear(serialport::ClearBuffer::All)
            .map_err(io::Error::from)
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let write_timeout = self.write_timeout;
        let read_timeout = self.read_timeout;
        let port = self.port_mut()?;

        // Writes get a longer budget than the polling reads.
        port.set_timeout(write_timeout).map_err(io::Error::from)?;
        let result = port
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| port.flush());
        port.set_timeout(read_timeout).map_err(io::Error::from)?;
        result
    }

    fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        let port = self.port_mut()?;
        let timeout = timeout.min(Duration::from_millis(100));
        if port.timeout() != timeout {
            port.set_timeout(timeout).map_err(io::Error::from)?;
        }

        let mut buf = [0u8; 256];
        match port.read(&mut buf) {
            Ok(n) => Ok(self.buffer_bytes(&buf[..n])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) {
        if let Some(name) = self.name.take() {
            tracing::debug!("Closing serial port {}", name);
        }
        self.port = None;
        self.pending.clear();
    }
}
