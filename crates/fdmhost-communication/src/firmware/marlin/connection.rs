//! Connection management
//!
//! Discovery, the DTR reset pulse, the `M115` handshake and teardown. A
//! successful connect starts a new generation: a fresh cancellation token
//! and the temperature monitor bound to it.

use super::controller::Shared;
use super::monitor;
use super::response_parser::{has_firmware_signature, is_acknowledgment};
use crate::communication::{find_printer_port, Transport};
use fdmhost_core::{PrinterError, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// The device link, owned by the command channel mutex
pub(crate) struct Link {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) connected: bool,
    /// Port of the most recent successful connect, reused by reconnect
    pub(crate) last_port: Option<String>,
    pub(crate) generation: Option<CancellationToken>,
    /// Replies still owed to fire-and-forget commands
    pub(crate) unacked: u32,
}

impl Link {
    pub(crate) fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            connected: false,
            last_port: None,
            generation: None,
            unacked: 0,
        }
    }
}

impl Shared {
    /// Open, reset and identify the printer
    ///
    /// Any existing link is torn down first. Returns the port name.
    pub(crate) async fn connect_locked(
        self: &Arc<Self>,
        link: &mut Link,
        port: Option<&str>,
    ) -> Result<String> {
        if link.connected {
            self.drop_link(link);
        }

        let result = self.open_and_identify(link, port).await;
        let port = match result {
            Ok(port) => port,
            Err(e) => {
                link.transport.close();
                tracing::warn!("Connection failed: {}", e);
                self.state.write().set_error(e.to_string());
                return Err(e);
            }
        };

        let token = CancellationToken::new();
        link.connected = true;
        link.unacked = 0;
        self.shutdown_sent.store(false, Ordering::SeqCst);
        link.last_port = Some(port.clone());
        link.generation = Some(token.clone());
        {
            let mut state = self.state.write();
            state.connected = true;
            state.port = Some(port.clone());
            state.last_error.clear();
        }

        tokio::spawn(monitor::run(Arc::downgrade(self), token));
        tracing::info!("Connected to printer on {}", port);
        Ok(port)
    }

    async fn open_and_identify(&self, link: &mut Link, port: Option<&str>) -> Result<String> {
        let port = match port {
            Some(port) => port.to_string(),
            None => self.discover(link)?,
        };

        tracing::info!("Opening {} at {} baud", port, self.config.baud_rate);
        link.transport
            .open(&port, self.config.baud_rate)
            .map_err(|e| PrinterError::Port {
                port: port.clone(),
                reason: e.to_string(),
            })?;

        // Toggling DTR reboots the mainboard.
        link.transport.set_dtr(false)?;
        sleep(self.config.reset_low).await;
        link.transport.set_dtr(true)?;
        sleep(self.config.reset_settle).await;
        link.transport.clear_buffers()?;

        self.handshake(link, &port).await?;
        Ok(port)
    }

    fn discover(&self, link: &Link) -> Result<String> {
        let ports = link
            .transport
            .available_ports()
            .map_err(|e| PrinterError::Port {
                port: "auto".to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!("Found {} serial ports", ports.len());

        find_printer_port(&ports, &self.config.signature).ok_or(PrinterError::NoDeviceFound)
    }

    async fn handshake(&self, link: &mut Link, port: &str) -> Result<()> {
        link.transport.write_line("M115")?;
        tracing::debug!("TX: M115");

        let deadline = Instant::now() + self.config.handshake_window;
        let mut response = String::new();
        let mut identified = false;

        while Instant::now() < deadline {
            match link.transport.read_line(self.config.poll_interval)? {
                Some(line) => {
                    tracing::debug!("RX: {}", line);
                    response.push_str(&line);
                    response.push('\n');
                    if has_firmware_signature(&line) {
                        identified = true;
                    }
                    if is_acknowledgment(&line) {
                        identified = true;
                        break;
                    }
                }
                None => sleep(self.config.poll_interval).await,
            }
        }

        if !identified {
            return Err(PrinterError::HandshakeFailed {
                port: port.to_string(),
                response,
            });
        }

        link.transport.clear_buffers()?;
        Ok(())
    }

    /// Close the device and end the current generation
    pub(crate) fn drop_link(&self, link: &mut Link) {
        if let Some(token) = link.generation.take() {
            token.cancel();
        }
        link.transport.close();
        if link.connected {
            tracing::info!("Closed connection to {}", link.last_port.as_deref().unwrap_or("printer"));
        }
        link.connected = false;
        link.unacked = 0;
        self.state.write().connected = false;
    }

    /// Tear down and reopen the last port after the settle interval
    pub(crate) async fn reconnect_locked(self: &Arc<Self>, link: &mut Link) -> Result<String> {
        let port = link.last_port.clone();
        tracing::info!(
            "Reconnecting to {}",
            port.as_deref().unwrap_or("auto-detected port")
        );

        self.drop_link(link);
        sleep(self.config.reconnect_settle).await;
        self.connect_locked(link, port.as_deref()).await
    }

    pub(crate) async fn reconnect(self: &Arc<Self>) -> Result<String> {
        let mut link = self.link.lock().await;
        self.reconnect_locked(&mut link).await
    }

    /// Send the shutdown sequence if a stop left one pending
    ///
    /// Every command is fire-and-forget and failures are swallowed.
    pub(crate) async fn shutdown_locked(&self, link: &mut Link) {
        if !self.shutdown_pending.swap(false, Ordering::SeqCst) {
            return;
        }
        if !link.connected {
            return;
        }
        self.shutdown_sent.store(true, Ordering::SeqCst);

        tracing::info!("Sending shutdown sequence");
        for command in self.config.shutdown_sequence() {
            if let Err(e) = self
                .exchange(link, &command, false, self.config.command_timeout)
                .await
            {
                tracing::debug!("Shutdown command {} failed: {}", command, e);
            }
            sleep(self.config.shutdown_gap).await;
        }
    }
}
