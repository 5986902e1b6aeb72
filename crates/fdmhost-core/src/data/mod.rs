//! Data models for printer state
//!
//! [`PrinterState`] is the single mutable record shared between the
//! connection manager, the command channel and the job executor.
//! [`PrinterStatus`] is the read-only snapshot handed to collaborators.

use serde::{Deserialize, Serialize};

/// Last-known-good temperatures in degrees Celsius
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    /// Bed temperature
    pub bed: f64,
    /// Bed target temperature
    pub bed_target: f64,
    /// Hotend temperature
    pub hotend: f64,
    /// Hotend target temperature
    pub hotend_target: f64,
}

impl Temperatures {
    /// Merge a parsed telemetry reading, keeping fields the reading lacks
    pub fn apply(&mut self, reading: &TemperatureReading) {
        if let Some(v) = reading.hotend {
            self.hotend = v;
        }
        if let Some(v) = reading.hotend_target {
            self.hotend_target = v;
        }
        if let Some(v) = reading.bed {
            self.bed = v;
        }
        if let Some(v) = reading.bed_target {
            self.bed_target = v;
        }
    }
}

/// Fields found in one telemetry line
///
/// `None` means "not reported", never "zero".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemperatureReading {
    pub hotend: Option<f64>,
    pub hotend_target: Option<f64>,
    pub bed: Option<f64>,
    pub bed_target: Option<f64>,
}

impl TemperatureReading {
    /// True when the line carried no temperature field at all
    pub fn is_empty(&self) -> bool {
        self.hotend.is_none()
            && self.hotend_target.is_none()
            && self.bed.is_none()
            && self.bed_target.is_none()
    }
}

/// Print job lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// No job has run since the last load
    #[default]
    Idle,
    /// Executor is feeding lines
    Running,
    /// Executor is idling until resume
    Paused,
    /// All lines were handled
    Completed,
    /// Ended by an explicit stop
    Stopped,
    /// Aborted by a fatal error
    Failed,
}

impl JobState {
    /// Check if the job has reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
            Self::Completed => write!(f, "Completed"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Mutable controller state
///
/// Invariants: `current_line <= total_lines`, `paused` implies `printing`,
/// and `progress` always equals `floor(current_line * 100 / total_lines)`
/// while `total_lines > 0`.
#[derive(Debug, Clone, Default)]
pub struct PrinterState {
    pub connected: bool,
    pub printing: bool,
    pub paused: bool,
    pub progress: u8,
    pub current_line: usize,
    pub total_lines: usize,
    pub temperature: Temperatures,
    pub last_error: String,
    pub port: Option<String>,
    pub job_state: JobState,
}

impl PrinterState {
    /// Create the all-zero, disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the cursor at the start of a job with `total_lines` lines
    pub fn reset_job(&mut self, total_lines: usize) {
        self.total_lines = total_lines;
        self.current_line = 0;
        self.progress = 0;
    }

    /// Move the cursor past one line and recompute progress
    pub fn advance_line(&mut self) {
        if self.current_line < self.total_lines {
            self.current_line += 1;
        }
        self.progress = progress_percent(self.current_line, self.total_lines);
    }

    /// Record an error message shown to collaborators
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = message.into();
    }

    /// Take a read-only copy for collaborators
    pub fn snapshot(&self) -> PrinterStatus {
        PrinterStatus {
            connected: self.connected,
            printing: self.printing,
            paused: self.paused,
            progress: self.progress,
            current_line: self.current_line,
            total_lines: self.total_lines,
            temperature: self.temperature,
            port: self.port.clone(),
            error: self.last_error.clone(),
            job_state: self.job_state,
        }
    }
}

/// Integer percentage of `done` over `total`, rounded down
pub fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done.min(total) as u128 * 100) / total as u128) as u8
}

/// Typed status snapshot for external pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatus {
    pub connected: bool,
    pub printing: bool,
    pub paused: bool,
    pub progress: u8,
    pub current_line: usize,
    pub total_lines: usize,
    pub temperature: Temperatures,
    pub port: Option<String>,
    pub error: String,
    pub job_state: JobState,
}

/// Outcome of a command, as handed to collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the command was acknowledged (or written, for fire-and-forget)
    pub success: bool,
    /// Raw response text, or the failure message
    pub response: String,
}

impl CommandResult {
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: response.into(),
        }
    }

    pub fn failed(response: impl Into<String>) -> Self {
        Self {
            success: false,
            response: response.into(),
        }
    }
}

impl From<crate::Result<String>> for CommandResult {
    fn from(result: crate::Result<String>) -> Self {
        match result {
            Ok(response) => Self::ok(response),
            Err(crate::PrinterError::Protocol { response }) => Self::failed(response),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}
