//! Marlin Controller Implementation
//!
//! [`MarlinController`] is the single entry point collaborators use: it
//! connects to the printer, forwards ad-hoc commands, and runs print jobs
//! in the background while status stays readable without blocking.
//!
//! Internally all device access is serialized through one async mutex that
//! owns the transport. Printer state lives behind a `parking_lot` lock that
//! is never held across an await.

use super::connection::Link;
use super::executor;
use super::ControllerConfig;
use crate::communication::{SerialPortInfo, SerialTransport, Transport};
use fdmhost_core::{
    CommandResult, GcodeJob, JobState, PrinterError, PrinterState, PrinterStatus, Result,
    StatusListener, StatusListenerHandle,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// State shared by the controller, the executor task and the monitor
pub(crate) struct Shared {
    pub(crate) config: ControllerConfig,
    pub(crate) link: tokio::sync::Mutex<Link>,
    pub(crate) state: RwLock<PrinterState>,
    pub(crate) job: RwLock<Option<GcodeJob>>,
    pub(crate) stop_requested: AtomicBool,
    /// A stop is waiting for its shutdown sequence to be sent
    pub(crate) shutdown_pending: AtomicBool,
    /// The last shutdown sequence has had no command after it
    pub(crate) shutdown_sent: AtomicBool,
    pub(crate) listeners: RwLock<HashMap<String, Arc<dyn StatusListener>>>,
    pub(crate) job_task: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn is_printing(&self) -> bool {
        self.state.read().printing
    }

    pub(crate) fn listener_list(&self) -> Vec<Arc<dyn StatusListener>> {
        self.listeners.read().values().cloned().collect()
    }

    /// Flag a stop and decide whether it owes a shutdown sequence
    ///
    /// A repeated stop while the same job is still winding down does not,
    /// nor does any stop after a sequence with no command since.
    fn request_stop(&self) {
        let printing = {
            let mut state = self.state.write();
            state.paused = false;
            state.printing
        };
        let already = self.stop_requested.swap(true, Ordering::SeqCst);
        if !(printing && already) && !self.shutdown_sent.load(Ordering::SeqCst) {
            self.shutdown_pending.store(true, Ordering::SeqCst);
        }
    }
}

/// Marlin printer controller
pub struct MarlinController {
    shared: Arc<Shared>,
}

impl MarlinController {
    /// Create a controller over any transport
    pub fn new(transport: Box<dyn Transport>, config: ControllerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                link: tokio::sync::Mutex::new(Link::new(transport)),
                state: RwLock::new(PrinterState::new()),
                job: RwLock::new(None),
                stop_requested: AtomicBool::new(false),
                shutdown_pending: AtomicBool::new(false),
                shutdown_sent: AtomicBool::new(false),
                listeners: RwLock::new(HashMap::new()),
                job_task: Mutex::new(None),
            }),
        }
    }

    /// Create a controller on a real serial port
    pub fn with_serial(config: ControllerConfig) -> Self {
        Self::new(Box::new(SerialTransport::new()), config)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    /// Connect to `port`, or discover the printer when `None`
    pub async fn connect(&self, port: Option<&str>) -> Result<String> {
        let mut link = self.shared.link.lock().await;
        self.shared.connect_locked(&mut link, port).await
    }

    /// Stop any job, send the shutdown sequence and close the port
    ///
    /// Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        self.shared.request_stop();

        let mut link = self.shared.link.lock().await;
        self.shared.shutdown_locked(&mut link).await;
        self.shared.drop_link(&mut link);
        self.shared.state.write().port = None;
    }

    /// Reopen the last port without touching the job
    pub async fn reconnect(&self) -> Result<String> {
        self.shared.reconnect().await
    }

    /// Serial devices visible to the transport
    pub async fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        let link = self.shared.link.lock().await;
        link.transport
            .available_ports()
            .map_err(|e| PrinterError::Port {
                port: "auto".to_string(),
                reason: e.to_string(),
            })
    }

    /// Send one command
    ///
    /// With `wait_for_ack` the call returns the response text up to and
    /// including the acknowledgment.
    pub async fn send(&self, command: &str, wait_for_ack: bool, timeout: Duration) -> Result<String> {
        self.shared.send(command, wait_for_ack, timeout).await
    }

    /// Send one command with the default timeout, folding errors into the result
    pub async fn send_command(&self, command: &str, wait_for_ack: bool) -> CommandResult {
        self.send(command, wait_for_ack, self.shared.config.command_timeout)
            .await
            .into()
    }

    /// Home all axes
    pub async fn home(&self) -> CommandResult {
        self.send_command("G28", true).await
    }

    /// Set bed and/or hotend targets without waiting
    pub async fn set_temperatures(&self, bed: Option<f64>, hotend: Option<f64>) -> CommandResult {
        let mut result = CommandResult::ok("");
        if let Some(bed) = bed {
            result = self.send_command(&format!("M140 S{}", bed), false).await;
            if !result.success {
                return result;
            }
        }
        if let Some(hotend) = hotend {
            result = self.send_command(&format!("M104 S{}", hotend), false).await;
        }
        result
    }

    /// Replace the loaded job
    pub fn load(&self, job: GcodeJob) -> Result<()> {
        let mut state = self.shared.state.write();
        if state.printing {
            return Err(PrinterError::AlreadyPrinting);
        }
        state.reset_job(job.len());
        state.job_state = JobState::Idle;
        *self.shared.job.write() = Some(job);
        Ok(())
    }

    /// Read a G-code file and load it
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.load(GcodeJob::from_file(path)?)
    }

    /// Start the loaded job in the background
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let job = self.shared.job.read().clone();

        let mut state = self.shared.state.write();
        if !state.connected {
            return Err(PrinterError::NotConnected);
        }
        let job = match job {
            Some(job) if !job.is_empty() => job,
            _ => return Err(PrinterError::NoJob),
        };
        if state.printing {
            return Err(PrinterError::AlreadyPrinting);
        }

        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.shared.shutdown_sent.store(false, Ordering::SeqCst);
        state.reset_job(job.len());
        state.printing = true;
        state.paused = false;
        state.job_state = JobState::Running;
        state.last_error.clear();
        drop(state);

        let handle = tokio::spawn(executor::run_job(Arc::clone(&self.shared), job));
        *self.shared.job_task.lock() = Some(handle);
        Ok(())
    }

    /// Pause a running job and park the head
    ///
    /// Returns `false` when no job is running or it is already paused.
    pub async fn pause(&self) -> bool {
        {
            let mut state = self.shared.state.write();
            if !state.printing || state.paused {
                return false;
            }
            state.paused = true;
            state.job_state = JobState::Paused;
        }

        tracing::info!("Pausing print");
        for command in self.shared.config.pause_macro.pause_commands() {
            if let Err(e) = self.send(&command, false, self.shared.config.command_timeout).await {
                tracing::warn!("Pause command {} failed: {}", command, e);
            }
        }
        true
    }

    /// Undo the pause moves and continue the job
    pub async fn resume(&self) -> bool {
        if !self.shared.state.read().paused {
            return false;
        }

        tracing::info!("Resuming print");
        for command in self.shared.config.pause_macro.resume_commands() {
            if let Err(e) = self.send(&command, false, self.shared.config.command_timeout).await {
                tracing::warn!("Resume command {} failed: {}", command, e);
            }
        }

        let mut state = self.shared.state.write();
        if state.printing && state.paused {
            state.paused = false;
            state.job_state = JobState::Running;
        }
        true
    }

    /// Request a stop and return immediately
    ///
    /// The executor ends with [`JobState::Stopped`] after its current line;
    /// the shutdown sequence goes out on a background task. Must be called
    /// from within a Tokio runtime.
    pub fn stop(&self) {
        tracing::info!("Stopping print");
        self.shared.request_stop();

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut link = shared.link.lock().await;
            shared.shutdown_locked(&mut link).await;
        });
    }

    /// Wait for the executor task of the last `start()` to finish
    pub async fn wait_for_job(&self) -> JobState {
        let handle = self.shared.job_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Print task ended abnormally: {}", e);
            }
        }
        self.shared.state.read().job_state
    }

    /// Snapshot of the printer state
    pub fn status(&self) -> PrinterStatus {
        self.shared.state.read().snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.read().connected
    }

    pub fn register_listener(&self, listener: Arc<dyn StatusListener>) -> StatusListenerHandle {
        let id = Uuid::new_v4().to_string();
        let handle = StatusListenerHandle(id.clone());
        self.shared.listeners.write().insert(id, listener);
        handle
    }

    pub fn unregister_listener(&self, handle: StatusListenerHandle) {
        let _ = self.shared.listeners.write().remove(&handle.0);
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.read().len()
    }
}

impl Drop for MarlinController {
    fn drop(&mut self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        if let Ok(mut link) = self.shared.link.try_lock() {
            if let Some(token) = link.generation.take() {
                token.cancel();
            }
            link.transport.close();
        }
    }
}
