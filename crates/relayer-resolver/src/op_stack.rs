use alloy::primitives::{address, Address, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest as AlloyTxRequest;
use alloy::sol;
use async_trait::async_trait;

use crate::error::ResolverError;
use crate::{GasEstimate, Resolver, Result};
use relayer_models::tx::TransactionRequest;

/// OP Stack's `GasPriceOracle` predeploy, at a fixed address on every
/// OP-stack chain (Optimism, Base, and their peers).
const GAS_PRICE_ORACLE_ADDRESS: Address = address!("420000000000000000000000000000000000000F");

sol! {
    #[sol(rpc)]
    interface GasPriceOracle {
        function getL1Fee(bytes memory data) external view returns (uint256);
    }
}

/// OP-stack adapter: identity block mapping (no distinct L1 reference block
/// is exposed by these chains), with gas estimates augmented by the L1
/// calldata-posting fee from the `GasPriceOracle` predeploy.
#[derive(Debug, Clone, Copy)]
pub struct OpStackResolver;

#[async_trait]
impl Resolver for OpStackResolver {
    async fn transaction_block_number(&self, observed_block_number: u64) -> Result<u64> {
        Ok(observed_block_number)
    }

    async fn estimate_gas(&self, provider: &DynProvider, tx: &TransactionRequest) -> Result<GasEstimate> {
        let request = AlloyTxRequest::default()
            .to(tx.to)
            .input(tx.data.clone().into())
            .value(tx.value);

        let l2_gas = provider
            .estimate_gas(request)
            .await
            .map_err(|e| ResolverError::Rpc { source: Box::new(e) })?;

        let oracle = GasPriceOracle::new(GAS_PRICE_ORACLE_ADDRESS, provider.clone());
        let l1_fee = oracle
            .getL1Fee(tx.data.clone())
            .call()
            .await
            .map_err(|e| ResolverError::Rpc { source: Box::new(e) })?;

        Ok(GasEstimate {
            gas_estimate: l2_gas,
            observed_gas_estimate: l2_gas,
            additional_fee_estimate: U256::from(l1_fee),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transaction_block_number_defaults_to_identity() {
        let resolver = OpStackResolver;
        assert_eq!(resolver.transaction_block_number(42).await.unwrap(), 42);
    }
}
