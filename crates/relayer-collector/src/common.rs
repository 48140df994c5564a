use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

use relayer_models::MonitorStatus;

use crate::error::{CollectorError, Result};

/// Knobs shared by every scanner, independent of bridge.
#[derive(Debug, Clone, Copy)]
pub struct ScannerConfig {
    /// `None` starts at the current monitor block. `Some(n)` with `n >= 0` is an
    /// explicit block. `Some(n)` with `n < 0` is an offset subtracted from the
    /// current monitor block at startup.
    pub starting_block: Option<i64>,
    pub stopping_block: Option<u64>,
    pub max_blocks: u64,
    pub processing_interval: Duration,
    pub retry_interval: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            starting_block: None,
            stopping_block: None,
            max_blocks: 1_000,
            processing_interval: Duration::from_millis(5_000),
            retry_interval: Duration::from_millis(5_000),
        }
    }
}

/// Resolves the first `fromBlock`, honoring a negative `startingBlock` as an
/// offset against the monitor's current block.
fn resolve_starting_block(config: &ScannerConfig, current_monitor_block: u64) -> Result<u64> {
    match config.starting_block {
        None => Ok(current_monitor_block),
        Some(explicit) if explicit >= 0 => Ok(explicit as u64),
        Some(offset) => current_monitor_block
            .checked_sub((-offset) as u64)
            .ok_or(CollectorError::BadConfigNegativeStartingBlock),
    }
}

/// The scanner loop shared by every bridge: attach, resolve the start
/// block, then repeatedly widen `[fromBlock, toBlock]` up to `maxBlocks`,
/// invoking `process_window` once per non-empty window and retrying on error
/// without advancing `fromBlock`.
pub async fn run_scanner_loop<F, Fut>(
    mut monitor_status: watch::Receiver<MonitorStatus>,
    config: ScannerConfig,
    mut process_window: F,
) -> Result<()>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    // Wait for the first real status rather than trusting the monitor's
    // placeholder initial value (block 0, see relayer-monitor).
    let _ = monitor_status.changed().await;
    let current = *monitor_status.borrow();
    let mut from_block = resolve_starting_block(&config, current.observed_block_number)?;

    loop {
        let latest = monitor_status.borrow().observed_block_number;
        let mut to_block = latest.min(from_block + config.max_blocks.saturating_sub(1));
        if let Some(stopping) = config.stopping_block {
            to_block = to_block.min(stopping);
        }

        if to_block < from_block {
            tokio::time::sleep(config.processing_interval).await;
            continue;
        }

        match process_window(from_block, to_block).await {
            Ok(()) => {
                let reached_stop = config.stopping_block.is_some_and(|stop| to_block >= stop);
                from_block = to_block + 1;
                if reached_stop {
                    return Ok(());
                }
                tokio::time::sleep(config.processing_interval).await;
            }
            Err(e) => {
                warn!(error = %e, from_block, to_block, "scanner window failed, retrying same window");
                tokio::time::sleep(config.retry_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_starting_block_is_used_verbatim() {
        let config = ScannerConfig {
            starting_block: Some(100),
            ..ScannerConfig::default()
        };
        assert_eq!(resolve_starting_block(&config, 500).unwrap(), 100);
    }

    #[test]
    fn negative_starting_block_offsets_from_monitor_block() {
        let config = ScannerConfig {
            starting_block: Some(-50),
            ..ScannerConfig::default()
        };
        assert_eq!(resolve_starting_block(&config, 500).unwrap(), 450);
    }

    #[test]
    fn negative_starting_block_underflow_is_bad_config() {
        let config = ScannerConfig {
            starting_block: Some(-50),
            ..ScannerConfig::default()
        };
        assert!(resolve_starting_block(&config, 10).is_err());
    }

    #[test]
    fn absent_starting_block_uses_current_monitor_block() {
        let config = ScannerConfig::default();
        assert_eq!(resolve_starting_block(&config, 777).unwrap(), 777);
    }
}
