use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::BlockNumberOrTag;
use tracing::warn;

use crate::error::{Result, WalletError};
use crate::fee::{FeeData, FeePolicyConfig};

/// The per-worker mutable state every queue reads and mutates.
pub struct TransactionHelper {
    provider: DynProvider,
    address: Address,
    pub fee_policy: FeePolicyConfig,
    nonce: u64,
    fee_data: FeeData,
    wallet_balance: U256,
    low_balance_warning: Option<U256>,
}

impl TransactionHelper {
    pub async fn new(
        provider: DynProvider,
        address: Address,
        fee_policy: FeePolicyConfig,
        low_balance_warning: Option<U256>,
    ) -> Result<Self> {
        fee_policy.validate()?;
        let nonce = provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| WalletError::Rpc { source: Box::new(e) })?;
        let balance = provider
            .get_balance(address)
            .await
            .map_err(|e| WalletError::Rpc { source: Box::new(e) })?;

        Ok(Self {
            provider,
            address,
            fee_policy,
            nonce,
            fee_data: FeeData::default(),
            wallet_balance: balance,
            low_balance_warning,
        })
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }

    /// Refreshes the cached nonce from the RPC, used on `NONCE_EXPIRED` /
    /// `REPLACEMENT_UNDERPRICED`.
    pub async fn refresh_nonce(&mut self) -> Result<()> {
        self.nonce = self
            .provider
            .get_transaction_count(self.address)
            .pending()
            .await
            .map_err(|e| WalletError::Rpc { source: Box::new(e) })?;
        Ok(())
    }

    /// The chain's "confirmed" nonce, used by the stall-detection poll
    /// (polls `signer.getNonce("latest")`).
    pub async fn latest_nonce(&self) -> Result<u64> {
        self.provider
            .get_transaction_count(self.address)
            .block_id(BlockNumberOrTag::Latest.into())
            .await
            .map_err(|e| WalletError::Rpc { source: Box::new(e) })
    }

    /// Refreshes the fee-data cache; on RPC failure the previous value is
    /// retained rather than propagated.
    pub async fn refresh_fee_data(&mut self) {
        match self.provider.get_gas_price().await {
            Ok(gas_price) => self.fee_data.gas_price = Some(U256::from(gas_price)),
            Err(e) => warn!(error = %e, "failed to refresh gas price, keeping previous value"),
        }
        match self.provider.estimate_eip1559_fees().await {
            Ok(estimate) => {
                self.fee_data.max_fee_per_gas = Some(U256::from(estimate.max_fee_per_gas));
                self.fee_data.max_priority_fee_per_gas =
                    Some(U256::from(estimate.max_priority_fee_per_gas));
            }
            Err(e) => warn!(error = %e, "failed to refresh eip-1559 fee estimate, keeping previous value"),
        }
    }

    /// Refreshes the wallet balance and warns if it has crossed
    /// `lowBalanceWarning` downward.
    pub async fn refresh_balance(&mut self) -> Result<()> {
        let previous = self.wallet_balance;
        let balance = self
            .provider
            .get_balance(self.address)
            .await
            .map_err(|e| WalletError::Rpc { source: Box::new(e) })?;
        self.wallet_balance = balance;
        if let Some(threshold) = self.low_balance_warning {
            if previous >= threshold && balance < threshold {
                warn!(address = %self.address, balance = %balance, threshold = %threshold, "wallet balance crossed low-balance warning threshold");
            }
        }
        Ok(())
    }

    pub fn balance(&self) -> U256 {
        self.wallet_balance
    }

    pub fn fee_data_for(&self, priority: bool) -> FeeData {
        self.fee_policy.fee_data_for(self.fee_data, priority)
    }

    pub fn current_fee_data(&self) -> FeeData {
        self.fee_data
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn address(&self) -> Address {
        self.address
    }
}
