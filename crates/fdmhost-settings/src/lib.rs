//! FdmHost Settings Crate
//!
//! Loads, validates and saves the print host configuration and turns it
//! into a controller configuration.

pub mod config;
pub mod error;

pub use config::{default_config_path, Config, ConnectionSettings, JobSettings, TimingSettings};
pub use error::{Result, SettingsError};
