//! Configuration management
//!
//! Handles loading, saving, and validating the print host configuration.
//! Files are JSON or TOML, chosen by extension. Every section falls back to
//! its defaults, so a partial file is enough.

use crate::error::{Result, SettingsError};
use fdmhost_communication::{ControllerConfig, PauseMacro, UsbSignature};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Port name, or "Auto" to discover the printer
    pub port: String,
    /// Baud rate for serial connections
    pub baud_rate: u32,
    /// USB vendor ID of the printer's serial bridge
    pub vendor_id: u16,
    /// USB product ID of the printer's serial bridge
    pub product_id: u16,
    /// Fragment of the port description identifying the bridge
    pub description: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        let signature = UsbSignature::default();
        Self {
            port: "Auto".to_string(),
            baud_rate: 115_200,
            vendor_id: signature.vid,
            product_id: signature.pid,
            description: signature.description,
        }
    }
}

impl ConnectionSettings {
    /// The explicit port, or `None` for discovery
    pub fn port(&self) -> Option<&str> {
        let port = self.port.trim();
        if port.is_empty() || port.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(port)
        }
    }
}

/// Delays and timeouts, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub reset_low_ms: u64,
    pub reset_settle_ms: u64,
    pub handshake_window_ms: u64,
    pub reconnect_settle_ms: u64,
    pub poll_interval_ms: u64,
    pub command_timeout_ms: u64,
    pub line_timeout_ms: u64,
    pub monitor_interval_ms: u64,
    pub monitor_timeout_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub pause_poll_ms: u64,
    pub shutdown_gap_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        let c = ControllerConfig::default();
        Self {
            reset_low_ms: millis(c.reset_low),
            reset_settle_ms: millis(c.reset_settle),
            handshake_window_ms: millis(c.handshake_window),
            reconnect_settle_ms: millis(c.reconnect_settle),
            poll_interval_ms: millis(c.poll_interval),
            command_timeout_ms: millis(c.command_timeout),
            line_timeout_ms: millis(c.line_timeout),
            monitor_interval_ms: millis(c.monitor_interval),
            monitor_timeout_ms: millis(c.monitor_timeout),
            reconnect_backoff_ms: millis(c.reconnect_backoff),
            pause_poll_ms: millis(c.pause_poll),
            shutdown_gap_ms: millis(c.shutdown_gap),
        }
    }
}

impl TimingSettings {
    fn entries(&self) -> [(&'static str, u64); 12] {
        [
            ("timing.reset_low_ms", self.reset_low_ms),
            ("timing.reset_settle_ms", self.reset_settle_ms),
            ("timing.handshake_window_ms", self.handshake_window_ms),
            ("timing.reconnect_settle_ms", self.reconnect_settle_ms),
            ("timing.poll_interval_ms", self.poll_interval_ms),
            ("timing.command_timeout_ms", self.command_timeout_ms),
            ("timing.line_timeout_ms", self.line_timeout_ms),
            ("timing.monitor_interval_ms", self.monitor_interval_ms),
            ("timing.monitor_timeout_ms", self.monitor_timeout_ms),
            ("timing.reconnect_backoff_ms", self.reconnect_backoff_ms),
            ("timing.pause_poll_ms", self.pause_poll_ms),
            ("timing.shutdown_gap_ms", self.shutdown_gap_ms),
        ]
    }
}

/// Print job behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Consecutive connection faults before a job is aborted
    pub max_reconnects: u32,
    /// Filament retracted on pause (mm)
    pub retract_mm: f64,
    /// Z lift on pause and stop (mm)
    pub lift_mm: f64,
    /// Feed rate of the pause moves (mm/min)
    pub feed_rate: f64,
    /// Home X and Y after a stop
    pub home_on_stop: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        let pause = PauseMacro::default();
        Self {
            max_reconnects: ControllerConfig::default().max_reconnects,
            retract_mm: pause.retract_mm,
            lift_mm: pause.lift_mm,
            feed_rate: pause.feed_rate,
            home_on_stop: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionSettings,
    pub timing: TimingSettings,
    pub job: JobSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Format::Json),
        Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Format::Toml),
        _ => Err(SettingsError::UnsupportedFormat(format!(
            "{} (expected .json or .toml)",
            path.display()
        ))),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise use the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)
                .map_err(|e| SettingsError::SaveError(e.to_string()))?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.connection.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }

        for (key, value) in self.timing.entries() {
            if value == 0 {
                return Err(SettingsError::invalid(key, "must be > 0"));
            }
        }

        if self.job.max_reconnects == 0 {
            return Err(SettingsError::invalid("job.max_reconnects", "must be > 0"));
        }

        for (key, value) in [
            ("job.retract_mm", self.job.retract_mm),
            ("job.lift_mm", self.job.lift_mm),
            ("job.feed_rate", self.job.feed_rate),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SettingsError::invalid(key, "must be > 0"));
            }
        }

        Ok(())
    }

    /// Build the controller configuration these settings describe
    pub fn controller_config(&self) -> ControllerConfig {
        let t = &self.timing;
        ControllerConfig {
            baud_rate: self.connection.baud_rate,
            signature: UsbSignature {
                vid: self.connection.vendor_id,
                pid: self.connection.product_id,
                description: self.connection.description.clone(),
            },
            reset_low: Duration::from_millis(t.reset_low_ms),
            reset_settle: Duration::from_millis(t.reset_settle_ms),
            handshake_window: Duration::from_millis(t.handshake_window_ms),
            reconnect_settle: Duration::from_millis(t.reconnect_settle_ms),
            poll_interval: Duration::from_millis(t.poll_interval_ms),
            command_timeout: Duration::from_millis(t.command_timeout_ms),
            line_timeout: Duration::from_millis(t.line_timeout_ms),
            monitor_interval: Duration::from_millis(t.monitor_interval_ms),
            monitor_timeout: Duration::from_millis(t.monitor_timeout_ms),
            reconnect_backoff: Duration::from_millis(t.reconnect_backoff_ms),
            max_reconnects: self.job.max_reconnects,
            pause_poll: Duration::from_millis(t.pause_poll_ms),
            shutdown_gap: Duration::from_millis(t.shutdown_gap_ms),
            pause_macro: PauseMacro {
                retract_mm: self.job.retract_mm,
                lift_mm: self.job.lift_mm,
                feed_rate: self.job.feed_rate,
            },
            home_on_stop: self.job.home_on_stop,
        }
    }
}

/// Default settings file under the platform config directory
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("fdmhost").join("config.toml"))
        .ok_or_else(|| SettingsError::ConfigDirectory("no platform config directory".to_string()))
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}
