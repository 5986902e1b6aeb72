//! Print job executor
//!
//! Streams a loaded job line by line through the command channel. Runs as a
//! single spawned task per `start()`; pause and stop are cooperative flags
//! checked between lines.

use super::controller::Shared;
use fdmhost_core::{GcodeJob, JobState, PrinterError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::sleep;

pub(crate) async fn run_job(shared: Arc<Shared>, job: GcodeJob) {
    let total = job.len();
    let max_reconnects = shared.config.max_reconnects;
    let mut connection_failures: u32 = 0;

    tracing::info!("Starting print: {} lines", total);

    let outcome = loop {
        if shared.stop_requested.load(Ordering::SeqCst) {
            break JobState::Stopped;
        }

        let (index, paused) = {
            let state = shared.state.read();
            (state.current_line, state.paused)
        };
        if index >= total {
            break JobState::Completed;
        }
        if paused {
            sleep(shared.config.pause_poll).await;
            continue;
        }

        if let Some(command) = job.command_at(index) {
            match shared.send(command, true, shared.config.line_timeout).await {
                Ok(_) => connection_failures = 0,
                Err(e) if shared.stop_requested.load(Ordering::SeqCst) => {
                    tracing::debug!("Line {} interrupted by stop: {}", index + 1, e);
                    break JobState::Stopped;
                }
                Err(e) if e.is_connection_error() => {
                    connection_failures += 1;
                    tracing::warn!(
                        "Connection error on line {} ({}/{}): {}",
                        index + 1,
                        connection_failures,
                        max_reconnects,
                        e
                    );
                    shared.state.write().set_error(e.to_string());

                    if connection_failures >= max_reconnects {
                        let abort = PrinterError::TooManyReconnects {
                            attempts: connection_failures,
                        };
                        tracing::error!("{}", abort);
                        shared.state.write().set_error(abort.to_string());
                        break JobState::Failed;
                    }

                    sleep(shared.config.reconnect_backoff).await;
                    if shared.stop_requested.load(Ordering::SeqCst) {
                        break JobState::Stopped;
                    }
                    if let Err(e) = shared.reconnect().await {
                        tracing::warn!("Reconnect failed: {}", e);
                    }
                    // Same line again.
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Line {} ({}) failed: {}", index + 1, command, e);
                    shared.state.write().set_error(e.to_string());
                }
            }
        }

        let status = {
            let mut state = shared.state.write();
            state.advance_line();
            state.snapshot()
        };
        for listener in shared.listener_list() {
            listener.on_progress(&status).await;
        }
    };

    let status = {
        let mut state = shared.state.write();
        state.printing = false;
        state.paused = false;
        if outcome == JobState::Completed {
            state.progress = 100;
        }
        state.job_state = outcome;
        state.snapshot()
    };

    match outcome {
        JobState::Failed => tracing::error!("Print failed at line {}: {}", status.current_line, status.error),
        _ => tracing::info!("Print {} ({}/{} lines)", outcome, status.current_line, status.total_lines),
    }

    for listener in shared.listener_list() {
        listener.on_job_finished(outcome, &status).await;
    }
}
