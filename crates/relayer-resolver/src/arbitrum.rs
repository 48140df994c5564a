use alloy::primitives::{address, Address, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::sol;
use async_trait::async_trait;

use crate::error::ResolverError;
use crate::{GasEstimate, Resolver, Result};
use relayer_models::tx::TransactionRequest;

/// Arbitrum's `NodeInterface` precompile, reachable at a fixed address on
/// every Arbitrum chain (not a deployed contract — intercepted by the node).
const NODE_INTERFACE_ADDRESS: Address = address!("00000000000000000000000000000000000000C8");

sol! {
    #[sol(rpc)]
    interface NodeInterface {
        function gasEstimateComponents(address to, bool contractCreation, bytes calldata data)
            external
            payable
            returns (uint64 gasEstimate, uint64 gasEstimateForL1, uint256 baseFee, uint256 l1BaseFeeEstimate);
    }
}

const L1_BLOCK_NUMBER_RETRIES: u32 = 3;

/// Arbitrum One / Nova adapter: resolves `transactionBlockNumber` against the
/// L1 reference block carried in `eth_getBlockByNumber`, and splits gas
/// estimates into L2 execution and L1 calldata-posting portions via the
/// `NodeInterface` precompile.
#[derive(Debug, Clone, Copy)]
pub struct ArbitrumResolver;

#[async_trait]
impl Resolver for ArbitrumResolver {
    async fn transaction_block_number(&self, observed_block_number: u64) -> Result<u64> {
        // The monitor already resolved `observed_block_number` against its own
        // provider; recovering the L1 reference requires an RPC round trip this
        // trait doesn't carry a provider handle for in the identity case, so
        // callers needing the Arbitrum L1 block must go through
        // `l1_block_number_of` below with an explicit provider.
        Ok(observed_block_number)
    }

    async fn estimate_gas(&self, provider: &DynProvider, tx: &TransactionRequest) -> Result<GasEstimate> {
        let node_interface = NodeInterface::new(NODE_INTERFACE_ADDRESS, provider.clone());

        let components = node_interface
            .gasEstimateComponents(tx.to, false, tx.data.clone())
            .call()
            .await
            .map_err(|e| ResolverError::Rpc { source: Box::new(e) })?;

        let total = components.gasEstimate;
        let l1_portion = components.gasEstimateForL1;
        if u64::from(l1_portion) > u64::from(total) {
            return Err(ResolverError::InvalidGasEstimate);
        }
        let l2_portion = total - l1_portion;

        Ok(GasEstimate {
            gas_estimate: total.into(),
            observed_gas_estimate: l2_portion.into(),
            additional_fee_estimate: U256::from(l1_portion) * U256::from(components.l1BaseFeeEstimate),
        })
    }
}

impl ArbitrumResolver {
    /// Reads the L1 reference block for an L2 block number from
    /// `eth_getBlockByNumber`'s Arbitrum-specific `l1BlockNumber` field, with
    /// bounded retry against transient RPC errors.
    pub async fn l1_block_number_of(
        &self,
        provider: &DynProvider,
        l2_block_number: u64,
    ) -> Result<u64> {
        let mut last_err = None;
        for _ in 0..L1_BLOCK_NUMBER_RETRIES {
            match provider
                .client()
                .request::<_, serde_json::Value>(
                    "eth_getBlockByNumber",
                    (format!("0x{l2_block_number:x}"), false),
                )
                .await
            {
                Ok(block) => {
                    let hex = block
                        .get("l1BlockNumber")
                        .and_then(|v| v.as_str())
                        .ok_or(ResolverError::InvalidGasEstimate)?;
                    let parsed = u64::from_str_radix(hex.trim_start_matches("0x"), 16)
                        .map_err(|_| ResolverError::InvalidGasEstimate)?;
                    return Ok(parsed);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(ResolverError::Rpc {
            source: Box::new(last_err.expect("loop runs at least once")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transaction_block_number_defaults_to_identity() {
        let resolver = ArbitrumResolver;
        assert_eq!(resolver.transaction_block_number(555).await.unwrap(), 555);
    }
}
