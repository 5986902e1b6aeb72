//! Scripted in-memory printer used by the integration tests

#![allow(dead_code)]

use fdmhost_communication::{ControllerConfig, SerialPortInfo, Transport};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

pub const PORT: &str = "/dev/ttyUSB0";

/// What the fake device knows and what it has seen
pub struct MockState {
    pub ports: Vec<SerialPortInfo>,
    pub open: bool,
    /// Every port opened, in order
    pub opened: Vec<String>,
    /// Every line the host tried to write, in order
    pub written: Vec<String>,
    pub dtr: Vec<bool>,
    pub incoming: VecDeque<String>,
    /// Reply to `M115`
    pub identity: Vec<String>,
    /// Canned replies by exact command; anything else gets "ok"
    pub replies: HashMap<String, Vec<String>>,
    /// Commands the device never answers
    pub silent: HashSet<String>,
    /// Writes starting with this prefix fail with a broken pipe
    pub fail_writes: Option<String>,
    pub fail_open: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            ports: vec![SerialPortInfo::new(PORT, "USB Serial").with_usb_ids(0x1a86, 0x7523)],
            open: false,
            opened: Vec::new(),
            written: Vec::new(),
            dtr: Vec::new(),
            incoming: VecDeque::new(),
            identity: vec![
                "FIRMWARE_NAME:Marlin 2.0.9.3 SOURCE_CODE_URL:github.com/MarlinFirmware/Marlin"
                    .to_string(),
                "Cap:AUTOREPORT_TEMP:1".to_string(),
                "ok".to_string(),
            ],
            replies: HashMap::new(),
            silent: HashSet::new(),
            fail_writes: None,
            fail_open: false,
        }
    }
}

impl MockState {
    /// Written lines without handshake and telemetry traffic
    pub fn commands(&self) -> Vec<String> {
        self.written
            .iter()
            .filter(|line| *line != "M115" && *line != "M105")
            .cloned()
            .collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.written.iter().filter(|line| *line == command).count()
    }
}

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> (Self, Arc<Mutex<MockState>>) {
        Self::with_state(MockState::default())
    }

    pub fn with_state(state: MockState) -> (Self, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(state));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "port closed")
}

impl Transport for MockTransport {
    fn available_ports(&self) -> io::Result<Vec<SerialPortInfo>> {
        Ok(self.state.lock().ports.clone())
    }

    fn open(&mut self, port: &str, _baud_rate: u32) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }
        state.open = true;
        state.opened.push(port.to_string());
        state.incoming.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(closed());
        }
        state.dtr.push(level);
        Ok(())
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(closed());
        }
        state.incoming.clear();
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(closed());
        }
        state.written.push(line.to_string());

        if let Some(prefix) = &state.fail_writes {
            if line.starts_with(prefix.as_str()) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
            }
        }

        let reply = if line == "M115" {
            state.identity.clone()
        } else if state.silent.contains(line) {
            Vec::new()
        } else {
            state
                .replies
                .get(line)
                .cloned()
                .unwrap_or_else(|| vec!["ok".to_string()])
        };
        state.incoming.extend(reply);
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> io::Result<Option<String>> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(closed());
        }
        Ok(state.incoming.pop_front())
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }
}

/// Millisecond-scale timings with the temperature monitor effectively off
pub fn fast_config() -> ControllerConfig {
    ControllerConfig {
        reset_low: Duration::from_millis(1),
        reset_settle: Duration::from_millis(1),
        handshake_window: Duration::from_millis(200),
        reconnect_settle: Duration::from_millis(1),
        poll_interval: Duration::from_millis(1),
        command_timeout: Duration::from_millis(500),
        line_timeout: Duration::from_millis(500),
        monitor_interval: Duration::from_secs(3600),
        monitor_timeout: Duration::from_millis(200),
        reconnect_backoff: Duration::from_millis(5),
        pause_poll: Duration::from_millis(5),
        shutdown_gap: Duration::from_millis(1),
        ..ControllerConfig::default()
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
