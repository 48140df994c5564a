use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::Address;
use alloy::providers::DynProvider;
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use alloy::sol;
use alloy::sol_types::{SolEvent, SolValue};
use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, warn};

use relayer_models::{parse_escrow_payload, Amb, ChainId, Message, MonitorStatus, Proof};
use relayer_store::Store;

use crate::common::{run_scanner_loop, ScannerConfig};
use crate::error::{CollectorError, Result};

sol! {
    #[derive(Debug)]
    event LogMessagePublished(address indexed sender, uint64 sequence, uint32 nonce, bytes payload, uint8 consistencyLevel);

    #[sol(rpc)]
    interface IMessageEscrow {
        function implementationAddress(address fromApp, bytes calldata data) external view returns (address);
    }
}

/// Per-chain Wormhole bridge wiring.
#[derive(Clone)]
pub struct WormholeScannerConfig {
    pub chain_id: ChainId,
    pub core_bridge_address: Address,
    pub message_escrow_address: Address,
    pub incentives_address: Address,
    pub scanner: ScannerConfig,
}

const IMPLEMENTATION_ADDRESS_RETRIES: u32 = 3;

/// Watches the Wormhole core bridge for `LogMessagePublished`, resolving the
/// destination incentives address via the message escrow contract, with a
/// small cache since the mapping is effectively static per `(app, dstChain)`
/// pair.
pub struct WormholeSourceScanner {
    provider: DynProvider,
    store: Arc<dyn Store>,
    config: WormholeScannerConfig,
    implementation_cache: DashMap<(Address, alloy::primitives::U256), Address>,
}

impl WormholeSourceScanner {
    pub fn new(provider: DynProvider, store: Arc<dyn Store>, config: WormholeScannerConfig) -> Self {
        Self {
            provider,
            store,
            config,
            implementation_cache: DashMap::new(),
        }
    }

    pub async fn run(mut self, monitor_status: watch::Receiver<MonitorStatus>) -> Result<()> {
        let scanner_config = self.config.scanner;
        run_scanner_loop(monitor_status, scanner_config, |from_block, to_block| {
            self.process_window(from_block, to_block)
        })
        .await
    }

    async fn process_window(&mut self, from_block: u64, to_block: u64) -> Result<()> {
        let filter = Filter::new()
            .address(self.config.core_bridge_address)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| CollectorError::Rpc { source: Box::new(e) })?;

        for log in logs {
            let Ok(decoded) = LogMessagePublished::decode_log(&log.inner, true) else {
                continue;
            };
            if decoded.data.sender != self.config.incentives_address {
                continue;
            }
            if let Err(e) = self.handle_log_message(&log, &decoded.data).await {
                warn!(error = %e, "failed to process LogMessagePublished");
            }
        }

        Ok(())
    }

    async fn handle_log_message(
        &self,
        log: &alloy::rpc::types::Log,
        event: &LogMessagePublished,
    ) -> Result<()> {
        let payload = parse_escrow_payload(&event.payload)?;

        let to_incentives_address = self
            .resolve_implementation_address(event.sender, payload.destination_id)
            .await?;

        let message = Message {
            message_identifier: payload.message_identifier,
            amb: Amb::Wormhole,
            from_chain_id: self.config.chain_id.clone(),
            // Wormhole chain ids are not EVM chain ids; the destination is
            // addressed purely by the escrow payload's `destinationId` here,
            // carried through as an opaque chain id string.
            to_chain_id: ChainId::new(payload.destination_id.to_string()),
            from_incentives_address: event.sender,
            to_incentives_address,
            incentives_payload: payload.application_payload,
            recovery_context: event.sequence.to_be_bytes().to_vec().into(),
            block_number: log.block_number.unwrap_or_default(),
            block_hash: log.block_hash.unwrap_or_default(),
            transaction_hash: log.transaction_hash.unwrap_or_default(),
            transaction_block_number: log.block_number.unwrap_or_default(),
        };

        let chain = message.from_chain_id.clone();
        self.store
            .set_message(&chain, message)
            .await
            .map_err(|source| CollectorError::StoreClosed { source })
    }

    async fn resolve_implementation_address(
        &self,
        from_app: Address,
        dst_chain_id: alloy::primitives::U256,
    ) -> Result<Address> {
        if let Some(cached) = self.implementation_cache.get(&(from_app, dst_chain_id)) {
            return Ok(*cached);
        }

        let escrow = IMessageEscrow::new(self.config.message_escrow_address, self.provider.clone());
        let data = dst_chain_id.abi_encode();

        let mut last_err = None;
        for _ in 0..IMPLEMENTATION_ADDRESS_RETRIES {
            match escrow.implementationAddress(from_app, data.clone().into()).call().await {
                Ok(address) => {
                    self.implementation_cache.insert((from_app, dst_chain_id), address);
                    return Ok(address);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(CollectorError::Rpc {
            source: Box::new(last_err.expect("loop runs at least once")),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WormholescanResponse {
    data: Vec<WormholescanVaa>,
}

#[derive(Debug, Deserialize)]
struct WormholescanVaa {
    sequence: u64,
    timestamp: DateTime<Utc>,
    vaa: String,
    #[serde(rename = "txHash")]
    #[allow(dead_code)]
    tx_hash: String,
}

/// Thin client over the Wormholescan REST API.
pub struct WormholescanClient {
    http: reqwest::Client,
    base_url: String,
}

impl WormholescanClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch_page(&self, wormhole_chain_id: u16, emitter: &str, page: u32, page_size: u32) -> Result<Vec<WormholescanVaa>> {
        let url = format!(
            "{}/api/v1/vaas/{}/{}?page={}&pageSize={}",
            self.base_url, wormhole_chain_id, emitter, page, page_size
        );
        let response: WormholescanResponse = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| CollectorError::Wormholescan { source })?
            .json()
            .await
            .map_err(|source| CollectorError::Wormholescan { source })?;
        Ok(response.data)
    }
}

/// Configuration for one (wormholeChainId, emitter) recovery backfill.
pub struct WormholeRecoveryConfig {
    pub wormhole_chain_id: u16,
    pub emitter: String,
    pub to_chain_id: ChainId,
    pub from_chain_id: ChainId,
    pub starting_block: u64,
    pub stopping_block: u64,
    pub page_size: u32,
}

/// Pulls historical VAAs from Wormholescan between two blocks (translated to
/// timestamps via the provider), paginating newest-first and replaying
/// oldest-first into the store.
///
/// The proof-producing "engine worker" described alongside this — a local
/// Wormhole guardian spy fed through a Redis-backed sequence cursor — has no
/// equivalent crate in this workspace's dependency stack, so its near-real-time
/// role is filled by [`WormholeTailWorker`] below, which polls the same
/// Wormholescan endpoint instead of a local spy process.
pub struct WormholeRecoveryWorker {
    provider: DynProvider,
    client: WormholescanClient,
    store: Arc<dyn Store>,
    config: WormholeRecoveryConfig,
}

impl WormholeRecoveryWorker {
    pub fn new(provider: DynProvider, client: WormholescanClient, store: Arc<dyn Store>, config: WormholeRecoveryConfig) -> Self {
        Self {
            provider,
            client,
            store,
            config,
        }
    }

    pub async fn run(self) -> Result<()> {
        let starting_timestamp = self.block_timestamp(self.config.starting_block).await?;
        let stopping_timestamp = self.block_timestamp(self.config.stopping_block).await?;

        let mut collected = Vec::new();
        let mut page = 0;
        loop {
            let vaas = self
                .client
                .fetch_page(self.config.wormhole_chain_id, &self.config.emitter, page, self.config.page_size)
                .await?;
            if vaas.is_empty() {
                break;
            }

            let mut exhausted = false;
            for vaa in vaas {
                if vaa.timestamp > stopping_timestamp {
                    continue;
                }
                if vaa.timestamp < starting_timestamp {
                    exhausted = true;
                    break;
                }
                collected.push(vaa);
            }
            if exhausted {
                break;
            }
            page += 1;
        }

        collected.sort_by_key(|vaa| vaa.sequence);
        for vaa in collected {
            if let Err(e) = self.replay(vaa).await {
                warn!(error = %e, "failed to replay recovered VAA");
            }
        }

        Ok(())
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<DateTime<Utc>> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await
            .map_err(|e| CollectorError::Rpc { source: Box::new(e) })?
            .ok_or_else(|| CollectorError::Rpc {
                source: "block not found".into(),
            })?;
        DateTime::from_timestamp(block.header.timestamp as i64, 0).ok_or_else(|| CollectorError::Rpc {
            source: "block timestamp out of range".into(),
        })
    }

    async fn replay(&self, vaa: WormholescanVaa) -> Result<()> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(vaa.vaa)
            .map_err(|e| CollectorError::Rpc { source: Box::new(e) })?;

        let proof = Proof {
            message_identifier: alloy::primitives::B256::ZERO,
            amb: Amb::Wormhole,
            from_chain_id: self.config.from_chain_id.clone(),
            to_chain_id: self.config.to_chain_id.clone(),
            message: bytes.into(),
            message_ctx: alloy::primitives::Bytes::new(),
        };
        info!(sequence = vaa.sequence, "replaying recovered VAA as proof");
        self.store
            .set_proof(&self.config.to_chain_id, proof)
            .await
            .map_err(|source| CollectorError::StoreClosed { source })
    }
}

/// Near-real-time substitute for the local-spy "engine worker": polls
/// Wormholescan's first page on an interval and replays any sequence number
/// higher than the last one seen per `(wormholeChainId, emitter)`.
pub struct WormholeTailWorker {
    client: WormholescanClient,
    store: Arc<dyn Store>,
    wormhole_chain_id: u16,
    emitter: String,
    to_chain_id: ChainId,
    from_chain_id: ChainId,
    poll_interval: Duration,
    last_sequence: HashMap<(u16, String), u64>,
}

impl WormholeTailWorker {
    pub fn new(
        client: WormholescanClient,
        store: Arc<dyn Store>,
        wormhole_chain_id: u16,
        emitter: String,
        from_chain_id: ChainId,
        to_chain_id: ChainId,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            store,
            wormhole_chain_id,
            emitter,
            to_chain_id,
            from_chain_id,
            poll_interval,
            last_sequence: HashMap::new(),
        }
    }

    pub async fn run(mut self) -> CollectorError {
        loop {
            if let Err(e) = self.tick().await {
                warn!(error = %e, "wormhole tail poll failed, retrying next interval");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn tick(&mut self) -> Result<()> {
        let vaas = self.client.fetch_page(self.wormhole_chain_id, &self.emitter, 0, 50).await?;
        let key = (self.wormhole_chain_id, self.emitter.clone());
        let floor = self.last_sequence.get(&key).copied().unwrap_or(0);

        let mut fresh: Vec<_> = vaas.into_iter().filter(|vaa| vaa.sequence > floor).collect();
        fresh.sort_by_key(|vaa| vaa.sequence);

        for vaa in fresh {
            let sequence = vaa.sequence;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&vaa.vaa)
                .map_err(|e| CollectorError::Rpc { source: Box::new(e) })?;
            let proof = Proof {
                message_identifier: alloy::primitives::B256::ZERO,
                amb: Amb::Wormhole,
                from_chain_id: self.from_chain_id.clone(),
                to_chain_id: self.to_chain_id.clone(),
                message: bytes.into(),
                message_ctx: alloy::primitives::Bytes::new(),
            };
            self.store
                .set_proof(&self.to_chain_id, proof)
                .await
                .map_err(|source| CollectorError::StoreClosed { source })?;
            self.last_sequence.insert(key.clone(), sequence);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wormholescan_vaa_deserializes_expected_shape() {
        let json = r#"{"data":[{"sequence":1,"timestamp":"2024-01-01T00:00:00Z","vaa":"AA==","txHash":"0xabc"}]}"#;
        let response: WormholescanResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].sequence, 1);
    }
}
