//! Command channel
//!
//! One command in flight at a time: the link mutex is held from the write
//! until the acknowledgment, error or timeout. Fire-and-forget commands
//! leave their replies unread; the next awaited command consumes those
//! first so it never takes an earlier `ok` for its own.

use super::connection::Link;
use super::controller::Shared;
use super::response_parser::{is_acknowledgment, is_error, parse_temperature};
use fdmhost_core::{PrinterError, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

impl Shared {
    pub(crate) async fn send(
        self: &Arc<Self>,
        command: &str,
        wait_for_ack: bool,
        timeout: Duration,
    ) -> Result<String> {
        let mut link = self.link.lock().await;
        self.send_locked(&mut link, command, wait_for_ack, timeout)
            .await
    }

    /// Send with one reconnect-and-retry on a device fault
    pub(crate) async fn send_locked(
        self: &Arc<Self>,
        link: &mut Link,
        command: &str,
        wait_for_ack: bool,
        timeout: Duration,
    ) -> Result<String> {
        if !link.connected {
            return Err(PrinterError::NotConnected);
        }

        let command = command.trim();
        if command.is_empty() {
            return Ok(String::new());
        }
        self.shutdown_sent.store(false, Ordering::SeqCst);

        let mut recovered = false;
        loop {
            match self.exchange(link, command, wait_for_ack, timeout).await {
                Err(PrinterError::Io { reason }) if !recovered => {
                    recovered = true;
                    tracing::warn!("I/O error sending {}: {}", command, reason);
                    if let Err(e) = self.reconnect_locked(link).await {
                        tracing::warn!("Reconnect failed: {}", e);
                        return Err(PrinterError::Io { reason });
                    }
                }
                result => return result,
            }
        }
    }

    /// Write one line and collect the reply, with no recovery
    pub(crate) async fn exchange(
        &self,
        link: &mut Link,
        command: &str,
        wait_for_ack: bool,
        timeout: Duration,
    ) -> Result<String> {
        if !wait_for_ack {
            link.transport.write_line(command)?;
            tracing::debug!("TX: {}", command);
            link.unacked += 1;
            return Ok(String::new());
        }

        self.drain_unacked(link, timeout).await?;

        link.transport.write_line(command)?;
        tracing::debug!("TX: {}", command);

        let deadline = Instant::now() + timeout;
        let mut response = String::new();
        loop {
            if Instant::now() >= deadline {
                return Err(PrinterError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }

            let Some(line) = link.transport.read_line(self.config.poll_interval)? else {
                sleep(self.config.poll_interval).await;
                continue;
            };

            tracing::debug!("RX: {}", line);
            self.apply_telemetry(&line);
            response.push_str(&line);
            response.push('\n');

            if is_error(&line) {
                return Err(PrinterError::Protocol { response });
            }
            if is_acknowledgment(&line) {
                return Ok(response);
            }
        }
    }

    /// Consume the replies still owed to fire-and-forget commands
    ///
    /// Waits at most `timeout`. Acknowledgments that never arrive are
    /// written off so the next command is still sent.
    async fn drain_unacked(&self, link: &mut Link, timeout: Duration) -> Result<()> {
        if link.unacked == 0 {
            return Ok(());
        }

        let deadline = Instant::now() + timeout;
        while link.unacked > 0 {
            if Instant::now() >= deadline {
                tracing::warn!("{} acknowledgments never arrived", link.unacked);
                link.unacked = 0;
                break;
            }

            let Some(line) = link.transport.read_line(self.config.poll_interval)? else {
                sleep(self.config.poll_interval).await;
                continue;
            };

            tracing::debug!("RX: {}", line);
            self.apply_telemetry(&line);

            if is_error(&line) {
                tracing::warn!("Unacknowledged command failed: {}", line);
                link.unacked -= 1;
            } else if is_acknowledgment(&line) {
                link.unacked -= 1;
            }
        }
        Ok(())
    }

    fn apply_telemetry(&self, line: &str) {
        let reading = parse_temperature(line);
        if !reading.is_empty() {
            self.state.write().temperature.apply(&reading);
        }
    }
}
