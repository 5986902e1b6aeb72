//! Temperature monitor
//!
//! Polls `M105` while no job is printing. One monitor runs per connection
//! generation and exits when that generation's token is cancelled.

use super::controller::Shared;
use fdmhost_core::Result;
use std::sync::Weak;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub(crate) async fn run(shared: Weak<Shared>, token: CancellationToken) {
    let period = match shared.upgrade() {
        Some(shared) => shared.config.monitor_interval,
        None => return,
    };

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if let Err(e) = shared.query_temperature(&token).await {
                    tracing::debug!("Temperature poll failed: {}", e);
                }
            }
        }
    }

    tracing::debug!("Temperature monitor stopped");
}

impl Shared {
    async fn query_temperature(&self, token: &CancellationToken) -> Result<()> {
        if self.is_printing() {
            return Ok(());
        }

        let mut link = self.link.lock().await;
        // A stale generation must never reach the new link.
        if token.is_cancelled() || !link.connected || self.is_printing() {
            return Ok(());
        }

        self.exchange(&mut link, "M105", true, self.config.monitor_timeout)
            .await
            .map(|_| ())
    }
}
