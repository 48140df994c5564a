use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::TxHash;
use alloy::providers::{DynProvider, Provider};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::warn;

use relayer_models::tx::{ConfirmedTransaction, PendingTransaction, TerminalError};

use crate::helper::TransactionHelper;
use crate::submit::{build_alloy_request, is_nonce_error};

struct ConfirmOrder {
    pending: PendingTransaction,
    attempt: u32,
}

/// What a spawned wait task settled on: the transaction that actually landed,
/// or nothing within `confirmation_timeout`.
type WaitResult = Option<(TxHash, alloy::rpc::types::TransactionReceipt)>;

/// Outcome of one order leaving the confirm queue this tick.
pub enum ConfirmOutcome {
    Confirmed(ConfirmedTransaction),
    Rejected(PendingTransaction, TerminalError),
    Unconfirmed(PendingTransaction),
}

/// Every order's receipt wait runs as its own tokio task from the moment it
/// is queued, so many can be outstanding at once; `process_orders` only
/// drains whichever of them have already settled and never blocks waiting
/// for one that hasn't.
pub struct ConfirmQueue {
    orders: HashMap<u64, ConfirmOrder>,
    waiting: JoinSet<(u64, WaitResult)>,
    next_id: u64,
    confirmations: u64,
    confirmation_timeout: Duration,
    default_max_tries: u32,
}

impl ConfirmQueue {
    pub fn new(confirmations: u64, confirmation_timeout: Duration, default_max_tries: u32) -> Self {
        Self {
            orders: HashMap::new(),
            waiting: JoinSet::new(),
            next_id: 0,
            confirmations,
            confirmation_timeout,
            default_max_tries,
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn add_orders(&mut self, pending: impl IntoIterator<Item = PendingTransaction>, provider: &DynProvider) {
        for pending in pending {
            let id = self.next_id;
            self.next_id += 1;
            self.spawn_wait(id, pending.tx, pending.tx_replacement, provider.clone());
            self.orders.insert(id, ConfirmOrder { pending, attempt: 0 });
        }
    }

    fn spawn_wait(&mut self, id: u64, original_tx: TxHash, replacement_tx: Option<TxHash>, provider: DynProvider) {
        let confirmations = self.confirmations;
        let confirmation_timeout = self.confirmation_timeout;
        self.waiting.spawn(async move {
            let original_wait = wait_for_receipt(&provider, original_tx, confirmations, confirmation_timeout);
            let result = match replacement_tx {
                Some(replacement_hash) => {
                    let replacement_wait =
                        wait_for_receipt(&provider, replacement_hash, confirmations, confirmation_timeout);
                    tokio::select! {
                        r = original_wait => r.map(|receipt| (original_tx, receipt)),
                        r = replacement_wait => r.map(|receipt| (replacement_hash, receipt)),
                    }
                }
                None => original_wait.await.map(|receipt| (original_tx, receipt)),
            };
            (id, result)
        });
    }

    /// Drains every wait that has already settled since the last tick. Orders
    /// still waiting are left running in the background and simply don't show
    /// up here yet; the worker loop returns to the submit queue in the
    /// meantime instead of stalling behind them.
    pub async fn process_orders(&mut self, helper: &mut TransactionHelper) -> Vec<ConfirmOutcome> {
        let mut outcomes = Vec::new();

        while let Some(joined) = self.waiting.try_join_next() {
            let (id, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "confirm wait task panicked, dropping its order");
                    continue;
                }
            };

            let Some(mut order) = self.orders.remove(&id) else {
                continue;
            };

            match result {
                Some((landed_tx, receipt)) => {
                    outcomes.push(ConfirmOutcome::Confirmed(ConfirmedTransaction {
                        pending: PendingTransaction {
                            tx: landed_tx,
                            ..order.pending
                        },
                        tx_receipt: receipt,
                    }));
                    continue;
                }
                None => {
                    order.attempt += 1;
                }
            }

            let max_tries = order
                .pending
                .request
                .options
                .max_tries
                .unwrap_or(self.default_max_tries);

            if order.attempt >= max_tries {
                outcomes.push(ConfirmOutcome::Unconfirmed(order.pending));
                continue;
            }

            if order.pending.tx_replacement.is_none() {
                helper.refresh_fee_data().await;
                let fee = helper
                    .fee_policy
                    .replacement_fee_for(helper.current_fee_data(), helper.fee_data_for(true));
                let nonce = order.pending.nonce;
                let replacement_request =
                    build_alloy_request(helper.address(), &order.pending.request.tx_request, nonce, fee);
                match helper.provider().send_transaction(replacement_request).await {
                    Ok(pending_tx) => {
                        order.pending.tx_replacement = Some(*pending_tx.tx_hash());
                    }
                    Err(e) if is_nonce_error(&e) => {
                        warn!(error = %e, "replacement transaction underpriced or nonce stale, continuing to await the original");
                    }
                    Err(e) => {
                        outcomes.push(ConfirmOutcome::Rejected(
                            order.pending,
                            TerminalError::Rejected { reason: e.to_string() },
                        ));
                        continue;
                    }
                }
            }

            self.spawn_wait(id, order.pending.tx, order.pending.tx_replacement, helper.provider().clone());
            self.orders.insert(id, order);
        }

        outcomes
    }
}

/// Polls for a transaction receipt with `confirmations` depth, bounded by
/// `timeout`. Returns `None` on timeout (the caller treats this as
/// `TIMEOUT`, moving the order to the next confirm attempt).
pub(crate) async fn wait_for_receipt(
    provider: &alloy::providers::DynProvider,
    tx_hash: TxHash,
    confirmations: u64,
    confirmation_timeout: Duration,
) -> Option<alloy::rpc::types::TransactionReceipt> {
    let poll = async {
        loop {
            if let Ok(Some(receipt)) = provider.get_transaction_receipt(tx_hash).await {
                if confirmations <= 1 {
                    return receipt;
                }
                if let Ok(latest) = provider.get_block_number().await {
                    if latest.saturating_sub(receipt.block_number.unwrap_or(latest)) + 1 >= confirmations {
                        return receipt;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    };

    timeout(confirmation_timeout, poll).await.ok()
}
