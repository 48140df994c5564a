mod arbitrum;
mod default;
mod error;
mod op_stack;
mod registry;

pub use arbitrum::ArbitrumResolver;
pub use default::DefaultResolver;
pub use error::{Result, ResolverError};
pub use op_stack::OpStackResolver;
pub use registry::ResolverRegistry;

use alloy::providers::DynProvider;
use async_trait::async_trait;
use relayer_models::tx::TransactionRequest;

/// Estimated gas cost of a transaction, split into an L2 execution portion and
/// an optional L1 data-availability surcharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    pub gas_estimate: u64,
    pub observed_gas_estimate: u64,
    pub additional_fee_estimate: alloy::primitives::U256,
}

/// A polymorphic per-chain adapter, selected by a string tag carried in
/// configuration. Implementations encapsulate chain-family quirks in
/// how a monitor's observed block maps to `transactionBlockNumber` and how gas
/// is estimated.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Maps the monitor's observed block number to the block number that
    /// should be recorded as a `Message`'s `transactionBlockNumber`. Defaults
    /// to identity; L2s that expose a distinct L1 reference block override it.
    async fn transaction_block_number(&self, observed_block_number: u64) -> Result<u64>;

    async fn estimate_gas(&self, provider: &DynProvider, tx: &TransactionRequest) -> Result<GasEstimate>;
}

/// Tag used to select [`DefaultResolver`] out of a [`ResolverRegistry`].
pub const DEFAULT_RESOLVER_TAG: &str = "default";
/// Tag used to select [`ArbitrumResolver`].
pub const ARBITRUM_RESOLVER_TAG: &str = "arbitrum";
/// Tag used to select [`OpStackResolver`].
pub const OP_STACK_RESOLVER_TAG: &str = "op-stack";
