// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::parsing::format_gwei;
use crate::domain::constants::{BPS_DENOMINATOR, LEGACY_GAS_PRICE_BUMP_BPS};
use crate::network::chain::{ChainClient, HeadSnapshot};

/// Fee conditions read from the chain at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainFeeSnapshot {
    pub base_fee: Option<u128>,
    /// `None` on legacy heads or when `eth_maxPriorityFeePerGas` failed.
    pub suggested_priority_fee: Option<u128>,
    /// Only queried when the head carries no base fee.
    pub suggested_legacy_price: Option<u128>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasParams {
    Legacy {
        gas_price: u128,
    },
    Dynamic {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl GasParams {
    /// Highest per-gas price the transaction may pay.
    pub fn max_price_per_gas(&self) -> u128 {
        match self {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Dynamic {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, GasParams::Legacy { .. })
    }
}

/// Bounds and multipliers for fee derivation. Fees in wei, multipliers in bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub min_priority_fee: u128,
    pub max_priority_fee: u128,
    pub priority_multiplier_bps: u64,
    pub base_fee_multiplier_bps: u64,
}

fn apply_bps(value: u128, bps: u128) -> u128 {
    value.saturating_mul(bps) / BPS_DENOMINATOR
}

impl FeePolicy {
    pub fn derive(&self, snapshot: &ChainFeeSnapshot) -> Result<GasParams, AppError> {
        let Some(base_fee) = snapshot.base_fee else {
            let price = snapshot
                .suggested_legacy_price
                .ok_or_else(|| AppError::chain_query("eth_gasPrice", "no legacy gas price"))?;
            return Ok(GasParams::Legacy {
                gas_price: apply_bps(price, LEGACY_GAS_PRICE_BUMP_BPS),
            });
        };

        let suggested = snapshot
            .suggested_priority_fee
            .unwrap_or(self.min_priority_fee);
        let floor = self.min_priority_fee.min(self.max_priority_fee);
        let priority = apply_bps(suggested, u128::from(self.priority_multiplier_bps))
            .clamp(floor, self.max_priority_fee);
        let max_fee = apply_bps(base_fee, u128::from(self.base_fee_multiplier_bps))
            .saturating_add(priority);

        Ok(GasParams::Dynamic {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority,
        })
    }
}

/// Head and fee readings taken together so the bundle targets the block the
/// fees were priced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeReading {
    pub head: HeadSnapshot,
    pub snapshot: ChainFeeSnapshot,
    pub params: GasParams,
}

pub struct FeeOracle {
    policy: FeePolicy,
}

impl FeeOracle {
    pub fn new(policy: FeePolicy) -> Self {
        Self { policy }
    }

    pub async fn snapshot<C>(&self, chain: &C) -> Result<(HeadSnapshot, ChainFeeSnapshot), AppError>
    where
        C: ChainClient + ?Sized,
    {
        let head = chain.latest_head().await?;
        let (suggested_priority_fee, suggested_legacy_price) = match head.base_fee_per_gas {
            Some(_) => (self.suggested_tip(chain).await, None),
            None => (None, Some(chain.gas_price().await?)),
        };
        Ok((
            head,
            ChainFeeSnapshot {
                base_fee: head.base_fee_per_gas,
                suggested_priority_fee,
                suggested_legacy_price,
            },
        ))
    }

    async fn suggested_tip<C>(&self, chain: &C) -> Option<u128>
    where
        C: ChainClient + ?Sized,
    {
        match chain.max_priority_fee_per_gas().await {
            Ok(tip) => Some(tip),
            Err(e) => {
                tracing::warn!(
                    target: "gas",
                    error = %e,
                    fallback_gwei = %format_gwei(self.policy.min_priority_fee),
                    "Priority fee suggestion unavailable; using minimum"
                );
                None
            }
        }
    }

    pub async fn read<C>(&self, chain: &C) -> Result<FeeReading, AppError>
    where
        C: ChainClient + ?Sized,
    {
        let (head, snapshot) = self.snapshot(chain).await?;
        let params = self.policy.derive(&snapshot)?;
        match params {
            GasParams::Legacy { gas_price } => tracing::info!(
                target: "gas",
                head = head.number,
                gas_price_gwei = %format_gwei(gas_price),
                "Gas market: legacy pricing"
            ),
            GasParams::Dynamic {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => tracing::info!(
                target: "gas",
                head = head.number,
                base_fee_gwei = %format_gwei(snapshot.base_fee.unwrap_or_default()),
                priority_fee_gwei = %format_gwei(max_priority_fee_per_gas),
                max_fee_gwei = %format_gwei(max_fee_per_gas),
                "Gas market: EIP-1559 pricing"
            ),
        }
        Ok(FeeReading {
            head,
            snapshot,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::WEI_PER_GWEI;
    use crate::network::chain::test_support::FakeChain;

    const GWEI: u128 = WEI_PER_GWEI;

    fn policy() -> FeePolicy {
        FeePolicy {
            min_priority_fee: 2 * GWEI,
            max_priority_fee: 50 * GWEI,
            priority_multiplier_bps: 30_000,
            base_fee_multiplier_bps: 25_000,
        }
    }

    #[test]
    fn legacy_price_is_bumped_by_half() {
        let params = policy()
            .derive(&ChainFeeSnapshot {
                base_fee: None,
                suggested_priority_fee: None,
                suggested_legacy_price: Some(20 * GWEI),
            })
            .expect("legacy");
        assert_eq!(params, GasParams::Legacy { gas_price: 30 * GWEI });
    }

    #[test]
    fn legacy_without_price_is_a_chain_query_error() {
        let err = policy()
            .derive(&ChainFeeSnapshot {
                base_fee: None,
                suggested_priority_fee: Some(GWEI),
                suggested_legacy_price: None,
            })
            .expect_err("must fail");
        assert!(matches!(err, AppError::ChainQuery { query: "eth_gasPrice", .. }));
    }

    #[test]
    fn dynamic_fees_follow_multipliers() {
        let params = policy()
            .derive(&ChainFeeSnapshot {
                base_fee: Some(10 * GWEI),
                suggested_priority_fee: Some(3 * GWEI),
                suggested_legacy_price: None,
            })
            .expect("dynamic");
        assert_eq!(
            params,
            GasParams::Dynamic {
                max_fee_per_gas: 25 * GWEI + 9 * GWEI,
                max_priority_fee_per_gas: 9 * GWEI,
            }
        );
    }

    #[test]
    fn priority_fee_stays_within_bounds() {
        let p = policy();
        for suggested in [0, 1, GWEI / 2, 5 * GWEI, 40 * GWEI, u128::MAX] {
            let params = p
                .derive(&ChainFeeSnapshot {
                    base_fee: Some(u128::MAX / 2),
                    suggested_priority_fee: Some(suggested),
                    suggested_legacy_price: None,
                })
                .expect("dynamic");
            let GasParams::Dynamic {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } = params
            else {
                panic!("expected dynamic params");
            };
            assert!(max_priority_fee_per_gas >= p.min_priority_fee);
            assert!(max_priority_fee_per_gas <= p.max_priority_fee);
            assert!(max_fee_per_gas >= max_priority_fee_per_gas);
        }
    }

    #[test]
    fn missing_tip_falls_back_to_minimum_before_multiplier() {
        let params = policy()
            .derive(&ChainFeeSnapshot {
                base_fee: Some(GWEI),
                suggested_priority_fee: None,
                suggested_legacy_price: None,
            })
            .expect("dynamic");
        assert_eq!(
            params,
            GasParams::Dynamic {
                max_fee_per_gas: GWEI * 5 / 2 + 6 * GWEI,
                max_priority_fee_per_gas: 6 * GWEI,
            }
        );
    }

    #[tokio::test]
    async fn legacy_head_skips_the_tip_query() {
        let chain = FakeChain {
            head: HeadSnapshot {
                number: 5,
                base_fee_per_gas: None,
            },
            tip: None,
            gas_price: 20 * GWEI,
            ..FakeChain::default()
        };
        let reading = FeeOracle::new(policy()).read(&chain).await.expect("legacy");
        assert_eq!(reading.params, GasParams::Legacy { gas_price: 30 * GWEI });
        assert_eq!(reading.snapshot.suggested_priority_fee, None);
        assert_eq!(chain.tip_queries(), 0);
    }

    #[tokio::test]
    async fn dynamic_head_queries_the_tip_once() {
        let chain = FakeChain::default();
        let (_, snapshot) = FeeOracle::new(policy()).snapshot(&chain).await.expect("dynamic");
        assert_eq!(snapshot.suggested_priority_fee, Some(GWEI));
        assert_eq!(snapshot.suggested_legacy_price, None);
        assert_eq!(chain.tip_queries(), 1);
    }

    #[test]
    fn max_price_per_gas_reads_the_cap() {
        assert_eq!(GasParams::Legacy { gas_price: 7 }.max_price_per_gas(), 7);
        assert_eq!(
            GasParams::Dynamic {
                max_fee_per_gas: 9,
                max_priority_fee_per_gas: 2
            }
            .max_price_per_gas(),
            9
        );
    }
}
