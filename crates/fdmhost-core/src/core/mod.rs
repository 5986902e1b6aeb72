//! Controller-facing traits

pub mod listener;

pub use listener::{StatusListener, StatusListenerHandle};
