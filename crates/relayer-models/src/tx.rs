use alloy::primitives::{Address, Bytes, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::ChainId;

/// An unsigned transaction as handed to the wallet service by a collector
/// scanner; nonce and fee fields are assigned by the submit pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
    pub gas_limit: Option<u64>,
}

/// Per-request overrides of the wallet worker's configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    pub max_tries: Option<u32>,
    pub deadline: Option<DateTime<Utc>>,
    pub retry_on_nonce_confirmation_error: Option<bool>,
    pub priority: Option<bool>,
}

/// Identifies the inbound message port an admitted request arrived on, for
/// routing the eventual `TransactionResult` back to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub u64);

/// Why submission or confirmation failed to produce a receipt for an admitted
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalError {
    DeadlineExceeded,
    MaxTriesReached,
    WalletCrashed,
    Cancelled,
    Rejected { reason: String },
}

/// The internal envelope a `WalletTransactionRequest` travels through the
/// pipeline as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransactionRequest {
    pub port_id: PortId,
    pub message_id: String,
    pub tx_request: TransactionRequest,
    pub metadata: serde_json::Value,
    pub options: TxOptions,
    #[serde(default)]
    pub requeue_count: u32,
    pub submission_error: Option<TerminalError>,
}

/// A submitted transaction awaiting confirmation: the original request plus
/// the signed transaction hash(es) in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub request: WalletTransactionRequest,
    pub tx: TxHash,
    /// The nonce the original submission used; a replacement must reuse it.
    pub nonce: u64,
    /// The fee-bumped replacement sent after the first confirmation timeout, if any.
    pub tx_replacement: Option<TxHash>,
    pub confirmation_error: Option<TerminalError>,
}

/// A `PendingTransaction` whose receipt has landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedTransaction {
    pub pending: PendingTransaction,
    pub tx_receipt: alloy::rpc::types::TransactionReceipt,
}

/// The single terminal value replied on a request's originating port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionResult {
    Confirmed {
        tx_request: TransactionRequest,
        metadata: serde_json::Value,
        tx: TxHash,
        tx_receipt: alloy::rpc::types::TransactionReceipt,
    },
    Failed {
        tx_request: TransactionRequest,
        metadata: serde_json::Value,
        submission_error: Option<TerminalError>,
        confirmation_error: Option<TerminalError>,
        /// Set when a cancellation self-send landed even though the original
        /// order did not confirm.
        tx_receipt: Option<alloy::rpc::types::TransactionReceipt>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn sample_request() -> TransactionRequest {
        TransactionRequest {
            to: address!("0000000000000000000000000000000000000003"),
            data: Bytes::from_static(b"\x12\x34"),
            value: U256::ZERO,
            gas_limit: Some(100_000),
        }
    }

    #[test]
    fn wallet_transaction_request_round_trips_through_json() {
        let req = WalletTransactionRequest {
            port_id: PortId(7),
            message_id: "msg-1".to_string(),
            tx_request: sample_request(),
            metadata: serde_json::json!({"note": "test"}),
            options: TxOptions {
                max_tries: Some(3),
                deadline: None,
                retry_on_nonce_confirmation_error: Some(false),
                priority: None,
            },
            requeue_count: 0,
            submission_error: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        let round_tripped: WalletTransactionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, round_tripped);
    }

    #[test]
    fn transaction_result_failed_carries_either_error() {
        let result = TransactionResult::Failed {
            tx_request: sample_request(),
            metadata: serde_json::Value::Null,
            submission_error: Some(TerminalError::MaxTriesReached),
            confirmation_error: None,
            tx_receipt: None,
        };
        match result {
            TransactionResult::Failed {
                submission_error,
                confirmation_error,
                ..
            } => {
                assert!(submission_error.is_some() || confirmation_error.is_some());
            }
            _ => panic!("expected Failed variant"),
        }
    }
}
