mod config;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::signers::local::PrivateKeySigner;
use secrecy::ExposeSecret;
use snafu::{ResultExt, Snafu};
use tokio::task::JoinSet;
use tracing::info;

use relayer_collector::{
    LayerZeroScanner, LayerZeroScannerConfig, WormholeRecoveryConfig, WormholeRecoveryWorker,
    WormholeScannerConfig, WormholeSourceScanner, WormholescanClient, WormholeTailWorker,
};
use relayer_common::{
    create_websocket_provider, create_websocket_wallet_provider, handle_background_thread_result,
    init_logger,
};
use relayer_models::ChainId;
use relayer_monitor::spawn_monitor;
use relayer_resolver::{ResolverRegistry, DEFAULT_RESOLVER_TAG};
use relayer_store::{InMemoryStore, Store};
use relayer_wallet::{WalletService, WalletServiceConfig};

pub use config::{AmbConfig, ChainConfig, ConfigError, GetterSettings, MonitorSettings, Settings, WalletSettings};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("configuration error: {}", source))]
    Config { source: ConfigError },

    #[snafu(display("invalid private key: {}", source))]
    PrivateKey { source: alloy::signers::local::LocalSignerError },

    #[snafu(display("provider error for chain {}: {}", chain, source))]
    Provider { chain: String, source: relayer_common::ProviderError },

    #[snafu(display("chain {} reported chain id {} but configuration expects {}", chain, reported, expected))]
    ChainIdMismatch { chain: String, reported: u64, expected: u64 },

    #[snafu(display("failed to query chain id for {}: {}", chain, source))]
    ChainIdCheck { chain: String, source: Box<dyn std::error::Error + Send + Sync> },

    #[snafu(display("unknown resolver tag {:?} for chain {}", tag, chain))]
    UnknownResolver { chain: String, tag: String },

    #[snafu(display("invalid address {:?} in amb configuration: {}", value, field))]
    InvalidAmbAddress { field: String, value: String },

    #[snafu(display("background thread error: {}", source))]
    BackgroundThread { source: Box<dyn std::error::Error + Send + Sync> },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn parse_address(value: &str, field: &str) -> Result<Address> {
    Address::from_str(value).map_err(|_| Error::InvalidAmbAddress {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Brings up every configured chain's monitor, wallet worker, and collector
/// scanners, then blocks on the top-level join set.
pub async fn run(settings: Settings) -> Result<()> {
    init_logger(&settings.global.log_level).map_err(|source| Error::BackgroundThread { source })?;

    let private_key = settings.private_key().context(ConfigSnafu)?;
    let signer = PrivateKeySigner::from_str(private_key.expose_secret()).context(PrivateKeySnafu)?;
    let wallet_address = signer.address();
    let private_key_bytes: [u8; 32] = signer.to_bytes().into();

    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let resolvers = ResolverRegistry::with_builtins();

    let mut join_set = JoinSet::new();
    let mut wallet_configs = Vec::new();

    // First pass: bring up one monitor + subscriber handles per chain, and
    // verify against a live chain id before wiring anything that spends gas.
    let mut monitor_handles = Vec::new();
    for chain in &settings.chains {
        info!(chain = %chain.name, chain_id = chain.chain_id, "connecting to chain");

        let read_provider = create_websocket_provider(&chain.rpc)
            .await
            .map_err(|source| Error::Provider { chain: chain.name.clone(), source })?
            .erased();

        let reported = read_provider
            .get_chain_id()
            .await
            .map_err(|e| Error::ChainIdCheck { chain: chain.name.clone(), source: Box::new(e) })?;
        if reported != chain.chain_id {
            return Err(Error::ChainIdMismatch {
                chain: chain.name.clone(),
                reported,
                expected: chain.chain_id,
            });
        }

        let monitor_config = MonitorSettings::merged(settings.global.monitor.as_ref(), chain.monitor.as_ref());
        let (monitor_handle, monitor_join) =
            spawn_monitor(read_provider.clone(), monitor_config, chain.chain_id.to_string());
        join_set.spawn(async move { monitor_join.await });

        let resolver_tag = chain.resolver.as_deref().unwrap_or(DEFAULT_RESOLVER_TAG);
        let resolver = resolvers
            .get(resolver_tag)
            .map_err(|_| Error::UnknownResolver {
                chain: chain.name.clone(),
                tag: resolver_tag.to_string(),
            })?;

        let wallet_provider = create_websocket_wallet_provider(&chain.rpc, private_key_bytes)
            .await
            .map_err(|source| Error::Provider { chain: chain.name.clone(), source })?
            .erased();

        wallet_configs.push(WalletServiceConfig {
            chain_id: chain.chain_id.to_string(),
            provider: wallet_provider,
            address: wallet_address,
            worker: WalletSettings::merged(settings.global.wallet.as_ref(), chain.wallet.as_ref()),
        });

        monitor_handles.push((chain.clone(), read_provider, resolver, monitor_handle));
    }

    let wallet_service = Arc::new(WalletService::spawn(wallet_configs));

    // Second pass: wire the collector scanners, one per (chain, enabled amb).
    for (chain, provider, resolver, monitor_handle) in monitor_handles {
        let scanner_config = GetterSettings::merged(settings.global.getter.as_ref(), chain.getter.as_ref());

        for amb in settings.ambs.iter().filter(|a| a.enabled) {
            let Some(incentives_hex) = amb.incentives_address.get(&chain.chain_id.to_string()) else {
                continue;
            };
            let incentives_address = parse_address(incentives_hex, &format!("{}.incentivesAddress", amb.name))?;

            match amb.name.as_str() {
                "layer-zero" => {
                    let endpoint_address = parse_address(
                        amb.endpoint_address.as_deref().unwrap_or_default(),
                        &format!("{}.endpointAddress", amb.name),
                    )?;
                    let receive_library_address = parse_address(
                        amb.receive_library_address.as_deref().unwrap_or_default(),
                        &format!("{}.receiveLibraryAddress", amb.name),
                    )?;
                    let eid_to_chain_id = amb
                        .eid_to_chain_id
                        .iter()
                        .map(|(eid, chain_id)| (*eid, ChainId::new(chain_id.clone())))
                        .collect();
                    let mut incentives_by_chain = std::collections::HashMap::new();
                    for (chain_id, address) in &amb.incentives_address {
                        incentives_by_chain.insert(
                            ChainId::new(chain_id.clone()),
                            parse_address(address, &format!("{}.incentivesAddress[{chain_id}]", amb.name))?,
                        );
                    }

                    let scanner = LayerZeroScanner::new(
                        provider.clone(),
                        resolver.clone(),
                        store.clone(),
                        LayerZeroScannerConfig {
                            chain_id: ChainId::new(chain.chain_id.to_string()),
                            endpoint_address,
                            receive_library_address,
                            eid_to_chain_id,
                            incentives_address: incentives_by_chain,
                            scanner: scanner_config,
                        },
                    );
                    let subscriber = monitor_handle.subscribe().await.map_err(|e| Error::BackgroundThread {
                        source: Box::new(e),
                    })?;
                    join_set.spawn(async move { scanner.run(subscriber).await });
                }
                "wormhole" => {
                    let core_bridge_address = parse_address(
                        amb.core_bridge_address.as_deref().unwrap_or_default(),
                        &format!("{}.coreBridgeAddress", amb.name),
                    )?;
                    let message_escrow_address = parse_address(
                        amb.message_escrow_address.as_deref().unwrap_or_default(),
                        &format!("{}.messageEscrowAddress", amb.name),
                    )?;

                    let source_scanner = WormholeSourceScanner::new(
                        provider.clone(),
                        store.clone(),
                        WormholeScannerConfig {
                            chain_id: ChainId::new(chain.chain_id.to_string()),
                            core_bridge_address,
                            message_escrow_address,
                            incentives_address,
                            scanner: scanner_config,
                        },
                    );
                    let subscriber = monitor_handle.subscribe().await.map_err(|e| Error::BackgroundThread {
                        source: Box::new(e),
                    })?;
                    join_set.spawn(async move { source_scanner.run(subscriber).await });

                    if let (Some(wormhole_chain_id), Some(wormholescan_url)) = (
                        amb.wormhole_chain_id.get(&chain.chain_id.to_string()).copied(),
                        amb.wormholescan_url.clone(),
                    ) {
                        let poll_interval =
                            Duration::from_millis(amb.tail_poll_interval_ms.unwrap_or(10_000));
                        let tail_worker = WormholeTailWorker::new(
                            WormholescanClient::new(wormholescan_url),
                            store.clone(),
                            wormhole_chain_id,
                            format!("{incentives_address:?}"),
                            ChainId::new(chain.chain_id.to_string()),
                            ChainId::new(chain.chain_id.to_string()),
                            poll_interval,
                        );
                        join_set.spawn(async move { Ok(tail_worker.run().await) });
                    }

                    if let (Some(wormhole_chain_id), Some(wormholescan_url), Some(starting), Some(stopping)) = (
                        amb.wormhole_chain_id.get(&chain.chain_id.to_string()).copied(),
                        amb.wormholescan_url.clone(),
                        scanner_config.starting_block,
                        scanner_config.stopping_block,
                    ) {
                        let recovery_worker = WormholeRecoveryWorker::new(
                            provider.clone(),
                            WormholescanClient::new(wormholescan_url),
                            store.clone(),
                            WormholeRecoveryConfig {
                                wormhole_chain_id,
                                emitter: format!("{incentives_address:?}"),
                                to_chain_id: ChainId::new(chain.chain_id.to_string()),
                                from_chain_id: ChainId::new(chain.chain_id.to_string()),
                                starting_block: starting.max(0) as u64,
                                stopping_block: stopping,
                                page_size: amb.recovery_page_size.unwrap_or(50),
                            },
                        );
                        join_set.spawn(async move { recovery_worker.run().await });
                    }
                }
                other => {
                    tracing::warn!(amb = other, "unrecognized amb name, skipping");
                }
            }
        }
    }

    // The wallet service is driven by requests arriving over whatever
    // front-end attaches ports to it; that front-end (e.g. a WebSocket
    // gateway) is out of scope here, so this process's own job ends at
    // keeping the service alive and observing scanners/monitors for their
    // lifetime.
    let _wallet_service = wallet_service;

    handle_background_thread_result(join_set.join_next().await)
        .map_err(|source| Error::BackgroundThread { source })
}
