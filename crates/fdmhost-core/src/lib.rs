//! # FdmHost Core
//!
//! Core types, errors, and traits for FdmHost.
//! Provides the shared printer state, the typed status snapshot, the
//! G-code job model and the error taxonomy used by every other crate.

pub mod core;
pub mod data;
pub mod error;
pub mod job;

pub use core::{StatusListener, StatusListenerHandle};

pub use data::{
    progress_percent, CommandResult, JobState, PrinterState, PrinterStatus, TemperatureReading,
    Temperatures,
};

pub use error::{PrinterError, Result};

pub use job::{strip_comment, GcodeJob};
