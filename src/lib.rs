//! # FdmHost
//!
//! A serial print host for Marlin-based FDM 3D printers (Creality Ender
//! series and similar) with support for:
//! - USB auto-discovery and the DTR reset / `M115` handshake
//! - One-command-at-a-time streaming with acknowledgment tracking
//! - Background temperature telemetry
//! - Pause, resume and stop with safe head moves
//! - Bounded automatic reconnection during a print
//!
//! ## Architecture
//!
//! FdmHost is organized as a workspace with multiple crates:
//!
//! 1. **fdmhost-core** - Printer state, status snapshot, job model, errors
//! 2. **fdmhost-communication** - Serial transport and the Marlin controller
//! 3. **fdmhost-settings** - Configuration files and validation
//! 4. **fdmhost** - Command-line binary that integrates all crates

pub use fdmhost_communication::firmware;

pub use fdmhost_core::{
    CommandResult, GcodeJob, JobState, PrinterError, PrinterStatus, Result, StatusListener,
    StatusListenerHandle, Temperatures,
};

pub use fdmhost_communication::{
    list_ports, ControllerConfig, MarlinController, PauseMacro, SerialPortInfo, SerialTransport,
    Transport, UsbSignature,
};

pub use fdmhost_settings::{default_config_path, Config, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - JSON lines instead when `FDMHOST_LOG_FORMAT=json`
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.to_string()));

    let json = std::env::var("FDMHOST_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .pretty();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
