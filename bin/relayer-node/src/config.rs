use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use snafu::{ensure, OptionExt, ResultExt, Snafu};

use relayer_collector::ScannerConfig;
use relayer_monitor::MonitorConfig;
use relayer_wallet::{FeePolicyConfig, WalletWorkerConfig};

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("required environment variable {} is not set", name))]
    MissingEnv { name: String },

    #[snafu(display("failed to load config file: {}", source))]
    Load { source: config::ConfigError },

    #[snafu(display("failed to deserialize config: {}", source))]
    Deserialize { source: config::ConfigError },

    #[snafu(display("private key loader tag {:?} is not registered", tag))]
    UnknownPrivateKeyLoader { tag: String },

    #[snafu(display("private key source for chain {} is missing", chain_id))]
    MissingPrivateKey { chain_id: String },

    #[snafu(display("chain {} has no resolver tag and no default was configured", chain_id))]
    MissingResolverTag { chain_id: String },

    #[snafu(display("amb config field {} is missing or not a valid address/value", field))]
    InvalidAmbField { field: String },
}

type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Where a chain's signing key comes from. The
/// `env` loader is built in; anything else is resolved against a
/// caller-supplied [`PrivateKeyLoaderRegistry`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum PrivateKeySource {
    Env { variable: String },
    File { path: String },
}

/// Resolves a [`PrivateKeySource`] into raw key bytes. The only built-in
/// loader reads an environment variable directly; a file-backed key is
/// accepted but logged as a warning, matching the ambient expectation that
/// keys at rest on disk are a downgrade from an env-injected secret.
pub fn resolve_private_key(source: &PrivateKeySource) -> Result<SecretString, ConfigError> {
    match source {
        PrivateKeySource::Env { variable } => std::env::var(variable)
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnv { name: variable.clone() }),
        PrivateKeySource::File { path } => {
            tracing::warn!(path = %path, "loading private key from file; prefer an env-backed source");
            std::fs::read_to_string(path)
                .map(|s| SecretString::from(s.trim().to_string()))
                .map_err(|_| ConfigError::MissingPrivateKey {
                    chain_id: path.clone(),
                })
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MonitorSettings {
    pub interval_ms: Option<u64>,
    pub block_delay: Option<u64>,
    pub no_block_update_warning_interval_ms: Option<u64>,
}

impl MonitorSettings {
    pub fn merged(global: Option<&MonitorSettings>, chain: Option<&MonitorSettings>) -> MonitorConfig {
        let mut out = MonitorConfig::default();
        for settings in [global, chain].into_iter().flatten() {
            if let Some(ms) = settings.interval_ms {
                out.interval = Duration::from_millis(ms);
            }
            if let Some(delay) = settings.block_delay {
                out.block_delay = delay;
            }
            if let Some(ms) = settings.no_block_update_warning_interval_ms {
                out.no_block_update_warning_interval = Duration::from_millis(ms);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct GetterSettings {
    pub max_blocks: Option<u64>,
    pub processing_interval_ms: Option<u64>,
    pub retry_interval_ms: Option<u64>,
    pub starting_block: Option<i64>,
    pub stopping_block: Option<u64>,
}

impl GetterSettings {
    pub fn merged(global: Option<&GetterSettings>, chain: Option<&GetterSettings>) -> ScannerConfig {
        let mut out = ScannerConfig::default();
        for settings in [global, chain].into_iter().flatten() {
            if let Some(v) = settings.max_blocks {
                out.max_blocks = v;
            }
            if let Some(ms) = settings.processing_interval_ms {
                out.processing_interval = Duration::from_millis(ms);
            }
            if let Some(ms) = settings.retry_interval_ms {
                out.retry_interval = Duration::from_millis(ms);
            }
            if let Some(v) = settings.starting_block {
                out.starting_block = Some(v);
            }
            if let Some(v) = settings.stopping_block {
                out.stopping_block = Some(v);
            }
        }
        out
    }
}

/// Recognized `global.wallet` / `chains[].wallet` options. `submitter`
/// is accepted as a distinct legacy section name for forward-compatibility
/// with older config files but currently carries no settings of its own — see
/// the Open Question note in `DESIGN.md`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct WalletSettings {
    pub retry_interval_ms: Option<u64>,
    pub processing_interval_ms: Option<u64>,
    pub max_tries: Option<u32>,
    pub max_pending_transactions: Option<usize>,
    pub confirmations: Option<u64>,
    pub confirmation_timeout_ms: Option<u64>,
    pub low_gas_balance_warning: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_allowed_priority_fee_per_gas: Option<String>,
    pub max_priority_fee_adjustment_factor: Option<f64>,
    pub max_allowed_gas_price: Option<String>,
    pub gas_price_adjustment_factor: Option<f64>,
    pub priority_adjustment_factor: Option<f64>,
}

fn parse_u256(s: &str) -> Option<U256> {
    U256::from_str_radix(s.trim_start_matches("0x"), if s.starts_with("0x") { 16 } else { 10 }).ok()
}

fn bps(factor: f64) -> u32 {
    (factor * relayer_wallet::BASIS_POINTS_BASE as f64).round() as u32
}

impl WalletSettings {
    pub fn merged(global: Option<&WalletSettings>, chain: Option<&WalletSettings>) -> WalletWorkerConfig {
        let mut out = WalletWorkerConfig::default();
        let mut fee = FeePolicyConfig::default();
        for settings in [global, chain].into_iter().flatten() {
            if let Some(ms) = settings.retry_interval_ms {
                out.retry_interval = Duration::from_millis(ms);
            }
            if let Some(ms) = settings.processing_interval_ms {
                out.processing_interval = Duration::from_millis(ms);
            }
            if let Some(v) = settings.max_tries {
                out.max_tries = v;
            }
            if let Some(v) = settings.max_pending_transactions {
                out.max_pending_transactions = v;
            }
            if let Some(v) = settings.confirmations {
                out.confirmations = v;
            }
            if let Some(ms) = settings.confirmation_timeout_ms {
                out.confirmation_timeout = Duration::from_millis(ms);
            }
            if let Some(v) = settings.low_gas_balance_warning.as_deref().and_then(parse_u256) {
                out.low_gas_balance_warning = Some(v);
            }
            if let Some(v) = settings.max_fee_per_gas.as_deref().and_then(parse_u256) {
                fee.configured_max_fee_per_gas = Some(v);
            }
            if let Some(v) = settings
                .max_allowed_priority_fee_per_gas
                .as_deref()
                .and_then(parse_u256)
            {
                fee.max_allowed_priority_fee_per_gas = Some(v);
            }
            if let Some(f) = settings.max_priority_fee_adjustment_factor {
                fee.max_priority_fee_adjustment_factor_bps = bps(f);
            }
            if let Some(v) = settings.max_allowed_gas_price.as_deref().and_then(parse_u256) {
                fee.max_allowed_gas_price = Some(v);
            }
            if let Some(f) = settings.gas_price_adjustment_factor {
                fee.gas_price_adjustment_factor_bps = bps(f);
            }
            if let Some(f) = settings.priority_adjustment_factor {
                fee.priority_adjustment_factor_bps = bps(f);
            }
        }
        out.fee_policy = fee;
        out
    }
}

/// `ambs[]` entry. The two bridge-specific fields blocks are both
/// optional; which one applies is selected by `name`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AmbConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `chainId -> incentives contract address`, hex-encoded.
    #[serde(default)]
    pub incentives_address: HashMap<String, String>,
    /// Accepted for schema compatibility; per-message gas-cost accounting is
    /// out of scope (the evaluator/pricing subsystem is not implemented).
    pub packet_cost: Option<String>,

    // layer-zero specific
    pub endpoint_address: Option<String>,
    pub receive_library_address: Option<String>,
    #[serde(default)]
    pub eid_to_chain_id: HashMap<u32, String>,

    // wormhole specific
    pub core_bridge_address: Option<String>,
    pub message_escrow_address: Option<String>,
    pub wormholescan_url: Option<String>,
    #[serde(default)]
    pub wormhole_chain_id: HashMap<String, u16>,
    pub recovery_page_size: Option<u32>,
    pub tail_poll_interval_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl AmbConfig {
    pub fn address(&self, field: &Option<String>, what: &str) -> Result<Address> {
        field
            .as_deref()
            .and_then(|s| s.parse().ok())
            .context(InvalidAmbFieldSnafu {
                field: format!("{}.{}", self.name, what),
            })
    }
}

/// `chains[]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc: String,
    pub resolver: Option<String>,
    #[serde(default)]
    pub monitor: Option<MonitorSettings>,
    #[serde(default)]
    pub getter: Option<GetterSettings>,
    #[serde(default)]
    pub wallet: Option<WalletSettings>,
}

/// `global.{...}` section. `pricing` and `evaluator` are accepted as
/// opaque values and otherwise ignored: profitability accounting is listed
/// among the ambient subsystems this system does not implement.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct GlobalConfig {
    pub private_key: PrivateKeySource,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub monitor: Option<MonitorSettings>,
    #[serde(default)]
    pub getter: Option<GetterSettings>,
    #[serde(default)]
    pub pricing: Option<serde_json::Value>,
    #[serde(default)]
    pub evaluator: Option<serde_json::Value>,
    #[serde(default)]
    pub submitter: Option<serde_json::Value>,
    #[serde(default)]
    pub persister: Option<serde_json::Value>,
    #[serde(default)]
    pub wallet: Option<WalletSettings>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level document shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Settings {
    pub global: GlobalConfig,
    pub ambs: Vec<AmbConfig>,
    pub chains: Vec<ChainConfig>,
}

impl Settings {
    /// Loads configuration from `CONFIG_FILE_PATH` if set, otherwise from
    /// `config.<NODE_ENV>.yaml`, requiring `NODE_ENV` and `RELAYER_PORT` to be
    /// present in the environment regardless of which path is taken.
    pub fn load() -> Result<Self> {
        let node_env = std::env::var("NODE_ENV").map_err(|_| ConfigError::MissingEnv {
            name: "NODE_ENV".to_string(),
        })?;
        ensure!(
            std::env::var("RELAYER_PORT").is_ok(),
            MissingEnvSnafu { name: "RELAYER_PORT" }
        );

        let path = std::env::var("CONFIG_FILE_PATH")
            .unwrap_or_else(|_| format!("config.{node_env}.yaml"));

        let raw = Config::builder()
            .add_source(File::with_name(&path))
            .add_source(Environment::with_prefix("RELAYER").separator("__"))
            .build()
            .context(LoadSnafu)?;

        raw.try_deserialize().context(DeserializeSnafu)
    }

    pub fn private_key(&self) -> Result<SecretString> {
        resolve_private_key(&self.global.private_key)
    }
}

pub fn expose_private_key(secret: &SecretString) -> &str {
    secret.expose_secret()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_settings_merge_prefers_chain_over_global() {
        let global = MonitorSettings {
            interval_ms: Some(5_000),
            block_delay: Some(1),
            no_block_update_warning_interval_ms: None,
        };
        let chain = MonitorSettings {
            interval_ms: Some(1_000),
            block_delay: None,
            no_block_update_warning_interval_ms: None,
        };
        let merged = MonitorSettings::merged(Some(&global), Some(&chain));
        assert_eq!(merged.interval, Duration::from_millis(1_000));
        assert_eq!(merged.block_delay, 1);
    }

    #[test]
    fn getter_settings_default_matches_scanner_default() {
        let merged = GetterSettings::merged(None, None);
        assert_eq!(merged.max_blocks, ScannerConfig::default().max_blocks);
    }

    #[test]
    fn wallet_settings_merge_applies_fee_overrides() {
        let chain = WalletSettings {
            max_tries: Some(7),
            gas_price_adjustment_factor: Some(1.2),
            ..Default::default()
        };
        let merged = WalletSettings::merged(None, Some(&chain));
        assert_eq!(merged.max_tries, 7);
        assert_eq!(merged.fee_policy.gas_price_adjustment_factor_bps, 12_000);
    }

    #[test]
    fn private_key_env_loader_reads_configured_variable() {
        std::env::set_var("TEST_RELAYER_PK", "0xabc123");
        let source = PrivateKeySource::Env {
            variable: "TEST_RELAYER_PK".to_string(),
        };
        let secret = resolve_private_key(&source).unwrap();
        assert_eq!(secret.expose_secret(), "0xabc123");
        std::env::remove_var("TEST_RELAYER_PK");
    }
}
