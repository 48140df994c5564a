use std::collections::VecDeque;

use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest as AlloyTransactionRequest;
use alloy::transports::{RpcError, TransportErrorKind};
use chrono::Utc;
use tracing::warn;

use relayer_models::tx::{PendingTransaction, TerminalError, WalletTransactionRequest};

use crate::fee::FeeData;
use crate::helper::TransactionHelper;

struct SubmitOrder {
    request: WalletTransactionRequest,
    tries: u32,
}

/// Outcome of one order leaving the submit queue this tick — either handed to
/// the confirm queue, or terminally failed.
pub enum SubmitOutcome {
    Pending(PendingTransaction),
    Failed {
        request: WalletTransactionRequest,
        error: TerminalError,
    },
}

/// Strictly serial (parallelism = 1) submission pipeline.
pub struct SubmitQueue {
    orders: VecDeque<SubmitOrder>,
    default_max_tries: u32,
}

impl SubmitQueue {
    pub fn new(default_max_tries: u32) -> Self {
        Self {
            orders: VecDeque::new(),
            default_max_tries,
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn add_orders(&mut self, requests: impl IntoIterator<Item = WalletTransactionRequest>) {
        self.orders
            .extend(requests.into_iter().map(|request| SubmitOrder { request, tries: 0 }));
    }

    /// Processes every order currently queued, one submission attempt each,
    /// serially. Orders that need another nonce-error retry remain queued for
    /// the next tick.
    pub async fn process_orders(&mut self, helper: &mut TransactionHelper) -> Vec<SubmitOutcome> {
        let mut outcomes = Vec::new();
        let mut remaining = VecDeque::new();

        while let Some(mut order) = self.orders.pop_front() {
            if let Some(deadline) = order.request.options.deadline {
                if Utc::now() > deadline {
                    outcomes.push(SubmitOutcome::Failed {
                        request: order.request,
                        error: TerminalError::DeadlineExceeded,
                    });
                    continue;
                }
            }

            let max_tries = order.request.options.max_tries.unwrap_or(self.default_max_tries);
            if order.tries >= max_tries {
                outcomes.push(SubmitOutcome::Failed {
                    request: order.request,
                    error: TerminalError::MaxTriesReached,
                });
                continue;
            }

            let nonce = helper.nonce();
            let fee = helper.fee_data_for(false);
            let alloy_request =
                build_alloy_request(helper.address(), &order.request.tx_request, nonce, fee);

            match helper.provider().send_transaction(alloy_request).await {
                Ok(pending) => {
                    helper.increment_nonce();
                    let tx_hash = *pending.tx_hash();
                    outcomes.push(SubmitOutcome::Pending(PendingTransaction {
                        request: order.request,
                        tx: tx_hash,
                        nonce,
                        tx_replacement: None,
                        confirmation_error: None,
                    }));
                }
                Err(e) => {
                    if is_nonce_error(&e) {
                        if let Err(refresh_err) = helper.refresh_nonce().await {
                            warn!(error = %refresh_err, "failed to refresh nonce after nonce error");
                        }
                        order.tries += 1;
                        remaining.push_back(order);
                    } else {
                        outcomes.push(SubmitOutcome::Failed {
                            request: order.request,
                            error: TerminalError::Rejected { reason: e.to_string() },
                        });
                    }
                }
            }
        }

        self.orders = remaining;
        outcomes
    }
}

/// Builds the alloy transaction request for submission, with `nonce` and
/// `helper.feeDataFor(priority=false)` applied.
pub(crate) fn build_alloy_request(
    from: alloy::primitives::Address,
    tx_request: &relayer_models::tx::TransactionRequest,
    nonce: u64,
    fee: FeeData,
) -> AlloyTransactionRequest {
    let mut request = AlloyTransactionRequest::default()
        .from(from)
        .to(tx_request.to)
        .input(tx_request.data.clone().into())
        .value(tx_request.value)
        .nonce(nonce);

    if let Some(gas_limit) = tx_request.gas_limit {
        request = request.gas_limit(gas_limit);
    }

    if fee.is_eip1559() {
        if let Some(max_fee) = fee.max_fee_per_gas {
            request = request.max_fee_per_gas(max_fee.to::<u128>());
        }
        if let Some(priority_fee) = fee.max_priority_fee_per_gas {
            request = request.max_priority_fee_per_gas(priority_fee.to::<u128>());
        }
    } else if let Some(gas_price) = fee.gas_price {
        request = request.gas_price(gas_price.to::<u128>());
    }

    request
}

/// NONCE_EXPIRED / REPLACEMENT_UNDERPRICED / `"invalid sequence"` body
/// substring match.
pub(crate) fn is_nonce_error(error: &RpcError<TransportErrorKind>) -> bool {
    match error {
        RpcError::ErrorResp(payload) => reason_is_nonce_error(&payload.message),
        _ => false,
    }
}

/// Same classification as [`is_nonce_error`], applied to an already-extracted
/// error message (used once the error has been stored as a `String` on a
/// terminal response).
pub(crate) fn reason_is_nonce_error(reason: &str) -> bool {
    let message = reason.to_lowercase();
    message.contains("nonce too low")
        || message.contains("nonce expired")
        || message.contains("replacement transaction underpriced")
        || message.contains("invalid sequence")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Bytes, U256};
    use relayer_models::tx::{PortId, TxOptions};

    fn sample_request() -> WalletTransactionRequest {
        WalletTransactionRequest {
            port_id: PortId(1),
            message_id: "m1".to_string(),
            tx_request: relayer_models::tx::TransactionRequest {
                to: address!("0000000000000000000000000000000000000009"),
                data: Bytes::new(),
                value: U256::ZERO,
                gas_limit: Some(21_000),
            },
            metadata: serde_json::Value::Null,
            options: TxOptions::default(),
            requeue_count: 0,
            submission_error: None,
        }
    }

    #[test]
    fn queue_starts_empty() {
        let queue = SubmitQueue::new(3);
        assert!(queue.is_empty());
    }

    #[test]
    fn add_orders_increases_len() {
        let mut queue = SubmitQueue::new(3);
        queue.add_orders(vec![sample_request()]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn past_deadline_is_detected_before_any_rpc_call() {
        let mut request = sample_request();
        request.options.deadline = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(request.options.deadline.unwrap() < Utc::now());
    }
}
