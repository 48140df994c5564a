mod error;

pub use error::{MonitorError, Result};

use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::providers::{DynProvider, Provider};
use chrono::Utc;
use relayer_models::MonitorStatus;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

/// Poll cadence and block-lag knobs for one chain's monitor task.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Poll cadence; accepted range is 1 ms – 120 s.
    pub interval: Duration,
    /// The monitor queries `block = latest − block_delay`.
    pub block_delay: u64,
    /// Emit a warning (rate-limited to this interval) if the observed block
    /// number makes no progress for longer than this.
    pub no_block_update_warning_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            block_delay: 0,
            no_block_update_warning_interval: Duration::from_secs(30),
        }
    }
}

enum MonitorControl {
    Subscribe(oneshot::Sender<watch::Receiver<MonitorStatus>>),
}

/// A request-port for attaching to a running monitor task.
#[derive(Clone)]
pub struct MonitorHandle {
    control_tx: mpsc::Sender<MonitorControl>,
}

impl MonitorHandle {
    /// Allocates a new subscriber port, returning a channel whose value is the
    /// most recently broadcast `MonitorStatus`. Delivery is best-effort: a
    /// slow subscriber observes only the latest status once it catches up.
    pub async fn subscribe(&self) -> Result<watch::Receiver<MonitorStatus>> {
        let (tx, rx) = oneshot::channel();
        self.control_tx
            .send(MonitorControl::Subscribe(tx))
            .await
            .map_err(|_| MonitorError::ChannelClosed)?;
        rx.await.map_err(|_| MonitorError::ChannelClosed)
    }
}

/// Spawns a monitor task against `provider` and returns a handle for
/// subscribing to its status broadcasts. The task runs until the provider is
/// dropped or a fatal (non-transient) condition is hit; it never returns on
/// the happy path, matching the ambient "any background task exit is fatal"
/// contract at the top-level join set.
pub fn spawn_monitor(
    provider: DynProvider,
    config: MonitorConfig,
    chain_id: String,
) -> (MonitorHandle, tokio::task::JoinHandle<MonitorError>) {
    let (control_tx, control_rx) = mpsc::channel(8);
    let (status_tx, status_rx) = watch::channel(MonitorStatus {
        observed_block_number: 0,
        block_hash: alloy::primitives::B256::ZERO,
        timestamp: Utc::now(),
    });

    let task = MonitorTask {
        provider,
        config,
        chain_id,
        control_rx,
        status_tx,
        status_rx,
        last_broadcast: None,
        last_progress_at: Utc::now(),
        warning_emitted_at: None,
    };

    let join = tokio::spawn(task.run());
    (MonitorHandle { control_tx }, join)
}

struct MonitorTask {
    provider: DynProvider,
    config: MonitorConfig,
    chain_id: String,
    control_rx: mpsc::Receiver<MonitorControl>,
    status_tx: watch::Sender<MonitorStatus>,
    status_rx: watch::Receiver<MonitorStatus>,
    last_broadcast: Option<u64>,
    last_progress_at: chrono::DateTime<Utc>,
    warning_emitted_at: Option<chrono::DateTime<Utc>>,
}

impl MonitorTask {
    async fn run(mut self) -> MonitorError {
        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(chain_id = %self.chain_id, error = %e, "monitor tick failed, will retry next interval");
                    }
                }
                control = self.control_rx.recv() => {
                    match control {
                        Some(MonitorControl::Subscribe(reply)) => {
                            let _ = reply.send(self.status_rx.clone());
                        }
                        None => return MonitorError::ChannelClosed,
                    }
                }
            }
        }
    }

    async fn tick(&mut self) -> Result<()> {
        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| MonitorError::Rpc { source: Box::new(e) })?;
        let target = latest.saturating_sub(self.config.block_delay);

        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(target))
            .await
            .map_err(|e| MonitorError::Rpc { source: Box::new(e) })?;

        let Some(block) = block else {
            return Ok(());
        };

        let now = Utc::now();
        if self.last_broadcast.is_none_or(|last| target > last) {
            self.last_broadcast = Some(target);
            self.last_progress_at = now;
            self.warning_emitted_at = None;
            let status = MonitorStatus {
                observed_block_number: target,
                block_hash: block.header.hash,
                timestamp: now,
            };
            info!(chain_id = %self.chain_id, block_number = target, "monitor observed new block");
            let _ = self.status_tx.send(status);
        } else {
            self.maybe_warn_stalled(now);
        }

        Ok(())
    }

    fn maybe_warn_stalled(&mut self, now: chrono::DateTime<Utc>) {
        let stalled_for = now - self.last_progress_at;
        let threshold = chrono::Duration::from_std(self.config.no_block_update_warning_interval)
            .unwrap_or(chrono::Duration::zero());
        if stalled_for < threshold {
            return;
        }
        let rate_limited = self
            .warning_emitted_at
            .is_some_and(|emitted| now - emitted < threshold);
        if rate_limited {
            return;
        }
        warn!(
            chain_id = %self.chain_id,
            stalled_for_secs = stalled_for.num_seconds(),
            "no block progress observed"
        );
        self.warning_emitted_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_bounds() {
        let config = MonitorConfig::default();
        assert!(config.interval >= Duration::from_millis(1));
        assert!(config.interval <= Duration::from_secs(120));
    }
}
