use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::DynProvider;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use relayer_models::tx::{PortId, TerminalError, TransactionRequest, TransactionResult, WalletTransactionRequest};

use crate::error::WalletError;
use crate::worker::{RoutedResult, WalletWorker, WalletWorkerConfig};

/// A caller's connection to one chain's wallet worker
/// ("`AttachToWallet(chainId)` returns a new port").
pub struct WalletPort {
    port_id: PortId,
    request_tx: mpsc::Sender<WalletTransactionRequest>,
    result_rx: mpsc::Receiver<TransactionResult>,
}

impl WalletPort {
    pub fn port_id(&self) -> PortId {
        self.port_id
    }

    pub async fn submit(
        &self,
        message_id: String,
        tx_request: TransactionRequest,
        metadata: serde_json::Value,
        options: relayer_models::tx::TxOptions,
    ) -> Result<(), WalletError> {
        self.request_tx
            .send(WalletTransactionRequest {
                port_id: self.port_id,
                message_id,
                tx_request,
                metadata,
                options,
                requeue_count: 0,
                submission_error: None,
            })
            .await
            .map_err(|_| WalletError::EnqueueFailed)
    }

    pub async fn recv(&mut self) -> Option<TransactionResult> {
        self.result_rx.recv().await
    }
}

/// Per-chain settings a [`WalletService`] needs to spawn and respawn workers
///.
#[derive(Clone)]
pub struct WalletServiceConfig {
    pub chain_id: String,
    pub provider: DynProvider,
    pub address: Address,
    pub worker: WalletWorkerConfig,
}

enum ChainControl {
    Attach {
        reply: oneshot::Sender<(PortId, mpsc::Receiver<TransactionResult>)>,
    },
}

struct ChainHandle {
    inbox_tx: mpsc::Sender<WalletTransactionRequest>,
    control_tx: mpsc::Sender<ChainControl>,
}

/// Routes inbound `WalletTransactionRequest`s to the correct per-chain
/// worker and respawns a worker after a crash.
pub struct WalletService {
    chains: HashMap<String, ChainHandle>,
}

impl WalletService {
    /// Spawns one supervisor (and its first worker generation) per configured
    /// chain. Supervisors run for the life of the process.
    pub fn spawn(configs: Vec<WalletServiceConfig>) -> Self {
        let mut chains = HashMap::new();
        for config in configs {
            let (inbox_tx, inbox_rx) = mpsc::channel(256);
            let (control_tx, control_rx) = mpsc::channel(16);
            let supervisor = ChainSupervisor {
                chain_id: config.chain_id.clone(),
                provider: config.provider,
                address: config.address,
                worker_config: config.worker,
                inbox_rx,
                control_rx,
                ports: HashMap::new(),
                next_port_id: 0,
            };
            tokio::spawn(supervisor.run());
            chains.insert(config.chain_id, ChainHandle { inbox_tx, control_tx });
        }
        Self { chains }
    }

    /// `AttachToWallet(chainId)`: allocates a new port bound to that chain's
    /// worker, forever forwarded across respawns.
    pub async fn attach(&self, chain_id: &str) -> Result<WalletPort, WalletError> {
        let handle = self.chains.get(chain_id).ok_or(WalletError::ChannelClosed)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        handle
            .control_tx
            .send(ChainControl::Attach { reply: reply_tx })
            .await
            .map_err(|_| WalletError::ChannelClosed)?;
        let (port_id, result_rx) = reply_rx.await.map_err(|_| WalletError::ChannelClosed)?;
        Ok(WalletPort {
            port_id,
            request_tx: handle.inbox_tx.clone(),
            result_rx,
        })
    }
}

/// Owns one chain's worker lifecycle: spawns it, routes its outbound results
/// to attached ports, and on crash broadcasts a `wallet-crashed` sentinel to
/// every attached port before respawning and replaying whatever piled up in
/// the inbox during the gap.
struct ChainSupervisor {
    chain_id: String,
    provider: DynProvider,
    address: Address,
    worker_config: WalletWorkerConfig,
    inbox_rx: mpsc::Receiver<WalletTransactionRequest>,
    control_rx: mpsc::Receiver<ChainControl>,
    ports: HashMap<PortId, mpsc::Sender<TransactionResult>>,
    next_port_id: u64,
}

impl ChainSupervisor {
    async fn run(mut self) {
        loop {
            let (worker_inbound_tx, worker_inbound_rx) = mpsc::channel(256);
            let (outbound_tx, mut outbound_rx) = mpsc::channel(256);

            let worker = match WalletWorker::new(
                self.chain_id.clone(),
                self.provider.clone(),
                self.address,
                self.worker_config,
                worker_inbound_rx,
                outbound_tx,
            )
            .await
            {
                Ok(worker) => worker,
                Err(e) => {
                    error!(chain_id = %self.chain_id, error = %e, "failed to construct wallet worker, retrying");
                    tokio::time::sleep(self.worker_config.retry_interval).await;
                    continue;
                }
            };

            let mut join = tokio::spawn(worker.run());
            info!(chain_id = %self.chain_id, "wallet worker started");

            loop {
                tokio::select! {
                    request = self.inbox_rx.recv() => {
                        match request {
                            Some(request) => {
                                if worker_inbound_tx.send(request).await.is_err() {
                                    break;
                                }
                            }
                            None => return,
                        }
                    }
                    control = self.control_rx.recv() => {
                        match control {
                            Some(ChainControl::Attach { reply }) => {
                                let port_id = PortId(self.next_port_id);
                                self.next_port_id += 1;
                                let (result_tx, result_rx) = mpsc::channel(64);
                                self.ports.insert(port_id, result_tx);
                                let _ = reply.send((port_id, result_rx));
                            }
                            None => return,
                        }
                    }
                    routed = outbound_rx.recv() => {
                        match routed {
                            Some(RoutedResult { port_id, result }) => {
                                if let Some(tx) = self.ports.get(&port_id) {
                                    let _ = tx.send(result).await;
                                }
                            }
                            None => break,
                        }
                    }
                    crash = &mut join => {
                        let reason = match crash {
                            Ok(wallet_error) => wallet_error,
                            Err(join_error) => {
                                error!(chain_id = %self.chain_id, error = %join_error, "wallet worker panicked");
                                WalletError::WalletCrashed
                            }
                        };
                        error!(chain_id = %self.chain_id, error = %reason, "wallet worker exited, broadcasting wallet-crashed sentinel");
                        self.broadcast_crash_sentinel().await;
                        break;
                    }
                }
            }
        }
    }

    async fn broadcast_crash_sentinel(&self) {
        for tx in self.ports.values() {
            let _ = tx
                .send(TransactionResult::Failed {
                    tx_request: TransactionRequest {
                        to: Address::ZERO,
                        data: Bytes::new(),
                        value: U256::ZERO,
                        gas_limit: None,
                    },
                    metadata: serde_json::Value::Null,
                    submission_error: Some(TerminalError::WalletCrashed),
                    confirmation_error: None,
                    tx_receipt: None,
                })
                .await;
        }
    }
}
