//! Status listener interface
//!
//! Defines the listener trait collaborators implement to follow a print
//! without polling.

use crate::data::{JobState, PrinterStatus};
use async_trait::async_trait;

/// Handle for a registered status listener.
///
/// Uniquely identifies a listener subscription. Can be used to unsubscribe
/// from status updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusListenerHandle(pub String);

/// Listener trait for print progress
///
/// Callbacks run on the executor task, so implementations should return
/// quickly.
#[async_trait]
pub trait StatusListener: Send + Sync {
    /// Called after every handled job line
    async fn on_progress(&self, _status: &PrinterStatus) {}

    /// Called once when a job reaches Completed, Stopped or Failed
    async fn on_job_finished(&self, _outcome: JobState, _status: &PrinterStatus) {}
}
