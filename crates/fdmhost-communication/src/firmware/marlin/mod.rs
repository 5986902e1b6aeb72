//! Marlin firmware support
//!
//! The controller drives a Marlin printer over a line-oriented serial link:
//! every command is one ASCII line, acknowledged by an `ok` line once the
//! firmware has accepted it.

mod channel;
mod connection;
pub mod controller;
mod executor;
mod monitor;
pub mod response_parser;

pub use controller::MarlinController;
pub use response_parser::{
    has_firmware_signature, is_acknowledgment, is_error, parse_temperature, MarlinResponse,
};

use crate::communication::UsbSignature;
use std::time::Duration;

/// Retract and lift applied around a pause
#[derive(Debug, Clone, PartialEq)]
pub struct PauseMacro {
    /// Filament retracted on pause, in mm
    pub retract_mm: f64,
    /// Z lift on pause, in mm
    pub lift_mm: f64,
    /// Feed rate for both moves, in mm/min
    pub feed_rate: f64,
}

impl Default for PauseMacro {
    fn default() -> Self {
        Self {
            retract_mm: 5.0,
            lift_mm: 10.0,
            feed_rate: 300.0,
        }
    }
}

impl PauseMacro {
    /// Relative retract-then-lift, back to absolute positioning
    pub fn pause_commands(&self) -> Vec<String> {
        vec![
            "G91".to_string(),
            format!("G1 E-{} F{}", self.retract_mm, self.feed_rate),
            format!("G1 Z{} F{}", self.lift_mm, self.feed_rate),
            "G90".to_string(),
        ]
    }

    /// Undo [`Self::pause_commands`] in reverse order
    pub fn resume_commands(&self) -> Vec<String> {
        vec![
            "G91".to_string(),
            format!("G1 Z-{} F{}", self.lift_mm, self.feed_rate),
            format!("G1 E{} F{}", self.retract_mm, self.feed_rate),
            "G90".to_string(),
        ]
    }
}

/// Controller tuning
///
/// Every wait the controller performs on the device is bounded by one of
/// these durations.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub baud_rate: u32,
    /// Identity used to pick a port when none is given
    pub signature: UsbSignature,
    /// DTR low time of the reset pulse
    pub reset_low: Duration,
    /// Boot time allowed after the reset pulse
    pub reset_settle: Duration,
    /// How long to collect the `M115` reply
    pub handshake_window: Duration,
    /// Pause between teardown and reopen on reconnect
    pub reconnect_settle: Duration,
    /// Delay between empty reads while awaiting an acknowledgment
    pub poll_interval: Duration,
    /// Default acknowledgment timeout for collaborator commands
    pub command_timeout: Duration,
    /// Acknowledgment timeout for job lines
    pub line_timeout: Duration,
    /// Temperature poll period
    pub monitor_interval: Duration,
    /// Acknowledgment timeout for temperature polls
    pub monitor_timeout: Duration,
    /// Wait before a job reconnects after a connection fault
    pub reconnect_backoff: Duration,
    /// Consecutive connection faults that abort a job
    pub max_reconnects: u32,
    /// Idle period of a paused job between flag checks
    pub pause_poll: Duration,
    /// Gap between shutdown commands
    pub shutdown_gap: Duration,
    pub pause_macro: PauseMacro,
    /// Home X and Y as part of the stop sequence
    pub home_on_stop: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            signature: UsbSignature::default(),
            reset_low: Duration::from_millis(300),
            reset_settle: Duration::from_secs(2),
            handshake_window: Duration::from_secs(1),
            reconnect_settle: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            command_timeout: Duration::from_secs(30),
            line_timeout: Duration::from_secs(30),
            monitor_interval: Duration::from_secs(2),
            monitor_timeout: Duration::from_secs(5),
            reconnect_backoff: Duration::from_secs(2),
            max_reconnects: 5,
            pause_poll: Duration::from_millis(100),
            shutdown_gap: Duration::from_millis(100),
            pause_macro: PauseMacro::default(),
            home_on_stop: false,
        }
    }
}

impl ControllerConfig {
    /// Heaters off, lift clear of the print, optionally home, motors off
    pub fn shutdown_sequence(&self) -> Vec<String> {
        let mut commands = vec![
            "M104 S0".to_string(),
            "M140 S0".to_string(),
            "G91".to_string(),
            format!(
                "G1 Z{} F{}",
                self.pause_macro.lift_mm, self.pause_macro.feed_rate
            ),
            "G90".to_string(),
        ];
        if self.home_on_stop {
            commands.push("G28 X Y".to_string());
        }
        commands.push("M84".to_string());
        commands
    }
}
