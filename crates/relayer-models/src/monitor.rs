use alloy::primitives::B256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The latest confirmed-block snapshot published to scanners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub observed_block_number: u64,
    pub block_hash: B256,
    pub timestamp: DateTime<Utc>,
}
