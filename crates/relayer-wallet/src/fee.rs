use alloy::primitives::U256;
use tracing::warn;

use crate::error::{AdjustmentFactorOutOfRangeSnafu, Result, WalletError};
use snafu::ensure;

/// Scale used throughout the fee policy's integer math: a factor of `1.10` is
/// carried as `11000`.
pub const BASIS_POINTS_BASE: u32 = 10_000;
const MIN_ADJUSTMENT_FACTOR_BPS: u32 = BASIS_POINTS_BASE;
const MAX_ADJUSTMENT_FACTOR_BPS: u32 = 5 * BASIS_POINTS_BASE;
pub const DEFAULT_PRIORITY_ADJUSTMENT_FACTOR_BPS: u32 = 11_000;

/// Raw fee data as reported by `eth_feeHistory` / `eth_gasPrice`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeData {
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl FeeData {
    pub fn is_eip1559(&self) -> bool {
        self.max_priority_fee_per_gas.is_some()
    }

    fn scale(&self, factor_bps: u32) -> Self {
        Self {
            gas_price: self.gas_price.map(|v| apply_bps(v, factor_bps)),
            max_fee_per_gas: self.max_fee_per_gas.map(|v| apply_bps(v, factor_bps)),
            max_priority_fee_per_gas: self
                .max_priority_fee_per_gas
                .map(|v| apply_bps(v, factor_bps)),
        }
    }

    fn elementwise_max(&self, other: &Self) -> Self {
        fn max_opt(a: Option<U256>, b: Option<U256>) -> Option<U256> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            }
        }
        Self {
            gas_price: max_opt(self.gas_price, other.gas_price),
            max_fee_per_gas: max_opt(self.max_fee_per_gas, other.max_fee_per_gas),
            max_priority_fee_per_gas: max_opt(
                self.max_priority_fee_per_gas,
                other.max_priority_fee_per_gas,
            ),
        }
    }

    fn all_absent(&self) -> bool {
        self.gas_price.is_none()
            && self.max_fee_per_gas.is_none()
            && self.max_priority_fee_per_gas.is_none()
    }
}

fn apply_bps(value: U256, bps: u32) -> U256 {
    value.saturating_mul(U256::from(bps)) / U256::from(BASIS_POINTS_BASE)
}

fn min_opt(value: Option<U256>, cap: Option<U256>) -> Option<U256> {
    match (value, cap) {
        (Some(v), Some(cap)) => Some(v.min(cap)),
        (Some(v), None) => Some(v),
        (None, _) => None,
    }
}

/// The per-chain fee policy knobs recognized under `chains[].wallet`.
#[derive(Debug, Clone, Copy)]
pub struct FeePolicyConfig {
    pub max_priority_fee_adjustment_factor_bps: u32,
    pub max_allowed_priority_fee_per_gas: Option<U256>,
    pub configured_max_fee_per_gas: Option<U256>,
    pub gas_price_adjustment_factor_bps: u32,
    pub max_allowed_gas_price: Option<U256>,
    pub priority_adjustment_factor_bps: u32,
}

impl Default for FeePolicyConfig {
    fn default() -> Self {
        Self {
            max_priority_fee_adjustment_factor_bps: BASIS_POINTS_BASE,
            max_allowed_priority_fee_per_gas: None,
            configured_max_fee_per_gas: None,
            gas_price_adjustment_factor_bps: BASIS_POINTS_BASE,
            max_allowed_gas_price: None,
            priority_adjustment_factor_bps: DEFAULT_PRIORITY_ADJUSTMENT_FACTOR_BPS,
        }
    }
}

impl FeePolicyConfig {
    /// All configured adjustment factors must satisfy `1 ≤ f ≤ 5`; violations
    /// fail loudly at init.
    pub fn validate(&self) -> Result<()> {
        validate_factor(
            "maxPriorityFeeAdjustmentFactor",
            self.max_priority_fee_adjustment_factor_bps,
        )?;
        validate_factor("gasPriceAdjustmentFactor", self.gas_price_adjustment_factor_bps)?;
        validate_factor("priorityAdjustmentFactor", self.priority_adjustment_factor_bps)?;
        Ok(())
    }

    /// Computes the fee data to stamp onto a fresh submission. `priority` applies the speed-up multiplier on top, for
    /// callers that explicitly requested priority fees.
    pub fn fee_data_for(&self, queried: FeeData, priority: bool) -> FeeData {
        let base = if queried.is_eip1559() {
            FeeData {
                gas_price: None,
                max_fee_per_gas: queried.max_fee_per_gas.or(self.configured_max_fee_per_gas),
                max_priority_fee_per_gas: min_opt(
                    queried
                        .max_priority_fee_per_gas
                        .map(|v| apply_bps(v, self.max_priority_fee_adjustment_factor_bps)),
                    self.max_allowed_priority_fee_per_gas,
                ),
            }
        } else {
            FeeData {
                gas_price: min_opt(
                    queried
                        .gas_price
                        .map(|v| apply_bps(v, self.gas_price_adjustment_factor_bps)),
                    self.max_allowed_gas_price,
                ),
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
            }
        };

        if priority {
            base.scale(self.priority_adjustment_factor_bps)
        } else {
            base
        }
    }

    /// Computes a replacement fee for a stuck transaction: the element-wise
    /// maximum of the original tx's fee scaled by the priority multiplier and
    /// the current priority-scaled fee data.
    pub fn replacement_fee_for(&self, tx_fee: FeeData, current_priority_scaled: FeeData) -> FeeData {
        let bumped = tx_fee.scale(self.priority_adjustment_factor_bps);
        let replacement = bumped.elementwise_max(&current_priority_scaled);
        if replacement.all_absent() {
            warn!("replacement fee computation produced no fee fields; proceeding with RPC defaults");
        }
        replacement
    }
}

fn validate_factor(name: &'static str, bps: u32) -> Result<()> {
    ensure!(
        (MIN_ADJUSTMENT_FACTOR_BPS..=MAX_ADJUSTMENT_FACTOR_BPS).contains(&bps),
        AdjustmentFactorOutOfRangeSnafu {
            name,
            value: bps as f64 / BASIS_POINTS_BASE as f64,
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_adjustment_factor_five_point_zero_succeeds() {
        let config = FeePolicyConfig {
            priority_adjustment_factor_bps: 50_000,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn priority_adjustment_factor_above_five_fails_init() {
        let config = FeePolicyConfig {
            priority_adjustment_factor_bps: 50_001,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WalletError::AdjustmentFactorOutOfRange { .. })
        ));
    }

    #[test]
    fn eip1559_path_caps_priority_fee_at_max_allowed() {
        let config = FeePolicyConfig {
            max_priority_fee_adjustment_factor_bps: 20_000,
            max_allowed_priority_fee_per_gas: Some(U256::from(5u64)),
            ..Default::default()
        };
        let queried = FeeData {
            gas_price: None,
            max_fee_per_gas: Some(U256::from(100u64)),
            max_priority_fee_per_gas: Some(U256::from(10u64)),
        };
        let result = config.fee_data_for(queried, false);
        assert_eq!(result.max_priority_fee_per_gas, Some(U256::from(5u64)));
        assert_eq!(result.max_fee_per_gas, Some(U256::from(100u64)));
    }

    #[test]
    fn legacy_path_caps_gas_price_at_max_allowed() {
        let config = FeePolicyConfig {
            gas_price_adjustment_factor_bps: 20_000,
            max_allowed_gas_price: Some(U256::from(15u64)),
            ..Default::default()
        };
        let queried = FeeData {
            gas_price: Some(U256::from(10u64)),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        };
        let result = config.fee_data_for(queried, false);
        assert_eq!(result.gas_price, Some(U256::from(15u64)));
    }
}
