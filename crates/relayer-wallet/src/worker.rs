use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use relayer_models::tx::{PortId, TerminalError, TransactionRequest, TransactionResult, WalletTransactionRequest};

use crate::confirm::{ConfirmOutcome, ConfirmQueue};
use crate::error::{Result, WalletError};
use crate::fee::FeePolicyConfig;
use crate::helper::TransactionHelper;
use crate::submit::{build_alloy_request, SubmitOutcome, SubmitQueue};

/// Recognized `chains[].wallet` options.
#[derive(Debug, Clone, Copy)]
pub struct WalletWorkerConfig {
    pub retry_interval: Duration,
    pub processing_interval: Duration,
    pub max_tries: u32,
    pub max_pending_transactions: usize,
    pub confirmations: u64,
    pub confirmation_timeout: Duration,
    pub low_gas_balance_warning: Option<U256>,
    pub fee_policy: FeePolicyConfig,
}

impl Default for WalletWorkerConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(30_000),
            processing_interval: Duration::from_millis(100),
            max_tries: 3,
            max_pending_transactions: 50,
            confirmations: 1,
            confirmation_timeout: Duration::from_millis(60_000),
            low_gas_balance_warning: None,
            fee_policy: FeePolicyConfig::default(),
        }
    }
}

/// One terminal response routed back to the service layer, tagged with the
/// originating port.
pub struct RoutedResult {
    pub port_id: PortId,
    pub result: TransactionResult,
}

/// Owns the provider, signer, helper, submit queue, confirm queue, and
/// inbound request buffer for a single chain. At most one worker per
/// chain is ever running — enforced by the service layer.
pub struct WalletWorker {
    chain_id: String,
    helper: TransactionHelper,
    submit: SubmitQueue,
    confirm: ConfirmQueue,
    inbound_rx: mpsc::Receiver<WalletTransactionRequest>,
    outbound_tx: mpsc::Sender<RoutedResult>,
    config: WalletWorkerConfig,
}

impl WalletWorker {
    pub async fn new(
        chain_id: String,
        provider: DynProvider,
        address: Address,
        config: WalletWorkerConfig,
        inbound_rx: mpsc::Receiver<WalletTransactionRequest>,
        outbound_tx: mpsc::Sender<RoutedResult>,
    ) -> Result<Self> {
        let helper = TransactionHelper::new(
            provider,
            address,
            config.fee_policy,
            config.low_gas_balance_warning,
        )
        .await?;

        Ok(Self {
            chain_id,
            helper,
            submit: SubmitQueue::new(config.max_tries),
            confirm: ConfirmQueue::new(config.confirmations, config.confirmation_timeout, config.max_tries),
            inbound_rx,
            outbound_tx,
            config,
        })
    }

    /// The main loop. Runs until the inbound channel closes (service
    /// shutdown) or a condition the worker cannot recover from is hit; either
    /// is treated as a worker crash by the owning [`crate::service::WalletService`].
    pub async fn run(mut self) -> WalletError {
        loop {
            let capacity = self
                .config
                .max_pending_transactions
                .saturating_sub(self.submit.len() + self.confirm.len());

            let mut new_batch = Vec::new();
            for _ in 0..capacity {
                match self.inbound_rx.try_recv() {
                    Ok(request) => new_batch.push(request),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => return WalletError::ChannelClosed,
                }
            }
            self.submit.add_orders(new_batch);

            self.helper.refresh_fee_data().await;
            if let Err(e) = self.helper.refresh_balance().await {
                warn!(chain_id = %self.chain_id, error = %e, "failed to refresh wallet balance");
            }

            let submit_outcomes = self.submit.process_orders(&mut self.helper).await;
            for outcome in submit_outcomes {
                match outcome {
                    SubmitOutcome::Pending(pending) => {
                        self.confirm.add_orders([pending], self.helper.provider())
                    }
                    SubmitOutcome::Failed { request, error } => {
                        self.respond_failed(request, Some(error), None, None).await;
                    }
                }
            }

            let confirm_outcomes = self.confirm.process_orders(&mut self.helper).await;
            for outcome in confirm_outcomes {
                match outcome {
                    ConfirmOutcome::Confirmed(confirmed) => {
                        self.respond(
                            confirmed.pending.request.port_id,
                            TransactionResult::Confirmed {
                                tx_request: confirmed.pending.request.tx_request,
                                metadata: confirmed.pending.request.metadata,
                                tx: confirmed.pending.tx,
                                tx_receipt: confirmed.tx_receipt,
                            },
                        )
                        .await;
                    }
                    ConfirmOutcome::Rejected(pending, error) => {
                        self.handle_rejected(pending, error).await;
                    }
                    ConfirmOutcome::Unconfirmed(pending) => {
                        self.handle_unconfirmed(pending).await;
                    }
                }
            }

            tokio::time::sleep(self.config.processing_interval).await;
        }
    }

    async fn handle_rejected(&mut self, pending: relayer_models::tx::PendingTransaction, error: TerminalError) {
        let is_nonce_class = matches!(&error, TerminalError::Rejected { reason } if crate::submit::reason_is_nonce_error(reason));
        let can_requeue = pending.request.options.retry_on_nonce_confirmation_error != Some(false)
            && pending.request.requeue_count < self.config.max_tries;

        if is_nonce_class && can_requeue {
            if let Err(e) = self.helper.refresh_nonce().await {
                warn!(chain_id = %self.chain_id, error = %e, "failed to refresh nonce before requeue");
            }
            let mut request = pending.request;
            request.requeue_count += 1;
            info!(chain_id = %self.chain_id, message_id = %request.message_id, requeue_count = request.requeue_count, "requeueing request after nonce-class confirmation error");
            self.submit.add_orders([request]);
        } else {
            self.respond_failed(pending.request, None, Some(error), None).await;
        }
    }

    /// The cancellation dance: a zero-value self-send at
    /// the stuck nonce with bumped fees, up to `maxTries`; on persistent
    /// failure, enter a stalled poll loop that blocks new submissions.
    async fn handle_unconfirmed(&mut self, pending: relayer_models::tx::PendingTransaction) {
        let stuck_nonce = pending.nonce;
        warn!(chain_id = %self.chain_id, nonce = stuck_nonce, "transaction unconfirmed after max tries, attempting cancellation");

        let cancel_request = TransactionRequest {
            to: self.helper.address(),
            data: alloy::primitives::Bytes::new(),
            value: U256::ZERO,
            gas_limit: Some(21_000),
        };

        for attempt in 0..self.config.max_tries {
            let fee = self
                .helper
                .fee_policy
                .replacement_fee_for(self.helper.current_fee_data(), self.helper.fee_data_for(true));
            let alloy_request = build_alloy_request(self.helper.address(), &cancel_request, stuck_nonce, fee);

            match self.helper.provider().send_transaction(alloy_request).await {
                Ok(pending_tx) => {
                    let hash = *pending_tx.tx_hash();
                    if let Some(receipt) = crate::confirm::wait_for_receipt(
                        self.helper.provider(),
                        hash,
                        self.config.confirmations,
                        self.config.confirmation_timeout,
                    )
                    .await
                    {
                        info!(chain_id = %self.chain_id, nonce = stuck_nonce, attempt, "cancellation self-send confirmed");
                        self.respond_failed(
                            pending.request,
                            None,
                            Some(TerminalError::Cancelled),
                            Some(receipt),
                        )
                        .await;
                        return;
                    }
                }
                Err(e) => {
                    warn!(chain_id = %self.chain_id, error = %e, attempt, "cancellation self-send failed");
                }
            }
        }

        error!(chain_id = %self.chain_id, nonce = stuck_nonce, "entering stalled state, no new requests will be processed until the nonce clears");
        loop {
            tokio::time::sleep(self.config.confirmation_timeout).await;
            match self.helper.latest_nonce().await {
                Ok(latest) if latest > stuck_nonce => {
                    info!(chain_id = %self.chain_id, "stall cleared, resuming normal operation");
                    break;
                }
                Ok(_) => continue,
                Err(e) => warn!(chain_id = %self.chain_id, error = %e, "failed to poll latest nonce while stalled"),
            }
        }
        self.respond_failed(pending.request, None, Some(TerminalError::Cancelled), None)
            .await;
    }

    async fn respond(&self, port_id: PortId, result: TransactionResult) {
        let _ = self.outbound_tx.send(RoutedResult { port_id, result }).await;
    }

    async fn respond_failed(
        &self,
        request: WalletTransactionRequest,
        submission_error: Option<TerminalError>,
        confirmation_error: Option<TerminalError>,
        tx_receipt: Option<alloy::rpc::types::TransactionReceipt>,
    ) {
        self.respond(
            request.port_id,
            TransactionResult::Failed {
                tx_request: request.tx_request,
                metadata: request.metadata,
                submission_error,
                confirmation_error,
                tx_receipt,
            },
        )
        .await;
    }
}
