use alloy::eips::BlockId;
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest as AlloyTxRequest;
use async_trait::async_trait;

use crate::{GasEstimate, Resolver, Result};
use relayer_models::tx::TransactionRequest;

/// Identity mapping, `provider.estimate_gas` with no L1 surcharge — the
/// fallback adapter for chains with no family-specific quirks.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResolver;

#[async_trait]
impl Resolver for DefaultResolver {
    async fn transaction_block_number(&self, observed_block_number: u64) -> Result<u64> {
        Ok(observed_block_number)
    }

    async fn estimate_gas(&self, provider: &DynProvider, tx: &TransactionRequest) -> Result<GasEstimate> {
        let request = AlloyTxRequest::default()
            .to(tx.to)
            .input(tx.data.clone().into())
            .value(tx.value);

        let gas = provider
            .estimate_gas(request)
            .block(BlockId::latest())
            .await
            .map_err(|e| crate::error::ResolverError::Rpc { source: Box::new(e) })?;

        Ok(GasEstimate {
            gas_estimate: gas,
            observed_gas_estimate: gas,
            additional_fee_estimate: alloy::primitives::U256::ZERO,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transaction_block_number_is_identity() {
        let resolver = DefaultResolver;
        assert_eq!(resolver.transaction_block_number(1234).await.unwrap(), 1234);
    }
}
