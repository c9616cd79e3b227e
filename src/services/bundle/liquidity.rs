// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::data::abi::{IUniswapV2Factory, IUniswapV2Pair, UniswapV2Router02};
use crate::domain::constants::RESERVE_RATIO_HAIRCUT_PERCENT;
use crate::network::chain::{CallRequest, ChainClient};
use alloy::primitives::{Address, U256};
use alloy_sol_types::SolCall;
use std::fmt;
use std::str::FromStr;

/// Slippage resolution: parts per billion.
const SLIPPAGE_SCALE: u64 = 1_000_000_000;

/// How much ETH the add-liquidity leg carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiquidityFunding {
    /// The remainder of the budget after the swap half.
    #[default]
    EvenSplit,
    /// ETH matching the pool's price for the swapped tokens, with a haircut,
    /// never more than the even-split remainder.
    ReserveRatio,
}

impl FromStr for LiquidityFunding {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "even_split" | "even" => Ok(LiquidityFunding::EvenSplit),
            "reserve_ratio" | "reserves" => Ok(LiquidityFunding::ReserveRatio),
            other => Err(AppError::Config(format!(
                "Unknown liquidity_funding '{other}' (expected even_split or reserve_ratio)"
            ))),
        }
    }
}

impl fmt::Display for LiquidityFunding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiquidityFunding::EvenSplit => f.write_str("even_split"),
            LiquidityFunding::ReserveRatio => f.write_str("reserve_ratio"),
        }
    }
}

/// `(swap, liquidity)` with `swap = floor(total / 2)`.
pub fn split_budget(total: U256) -> (U256, U256) {
    let swap = total / U256::from(2u8);
    (swap, total - swap)
}

/// Slippage clamped to `[0, 1]` and rounded to the nearest part per billion.
/// Fractions finer than 1e-9 do not survive this step.
pub fn slippage_ppb(slippage: f64) -> u64 {
    if slippage.is_nan() {
        return 0;
    }
    let ppb = (slippage.clamp(0.0, 1.0) * SLIPPAGE_SCALE as f64).round() as u64;
    ppb.min(SLIPPAGE_SCALE)
}

/// `floor(amount × (10⁹ − ppb) / 10⁹)` with `ppb = slippage_ppb(slippage)`.
/// Exact over the whole `U256` range.
pub fn apply_slippage(amount: U256, slippage: f64) -> U256 {
    let scale = U256::from(SLIPPAGE_SCALE);
    let keep = U256::from(SLIPPAGE_SCALE - slippage_ppb(slippage));
    let whole = amount / scale;
    let rest = amount % scale;
    whole * keep + rest * keep / scale
}

/// ETH to pair with `expected_out` tokens at the pool's reserve ratio, after
/// the haircut and capped at `cap`.
pub fn reserve_ratio_amount(
    expected_out: U256,
    eth_reserve: U256,
    token_reserve: U256,
    cap: U256,
) -> Result<U256, AppError> {
    if eth_reserve.is_zero() || token_reserve.is_zero() {
        return Err(AppError::Route("pool has zero reserves".into()));
    }
    let priced = expected_out
        .checked_mul(eth_reserve)
        .ok_or_else(|| AppError::AmountOverflow("reserve-ratio ETH amount".into()))?
        / token_reserve;
    let with_haircut = priced
        .checked_mul(U256::from(RESERVE_RATIO_HAIRCUT_PERCENT))
        .ok_or_else(|| AppError::AmountOverflow("reserve-ratio haircut".into()))?
        / U256::from(100u8);
    Ok(with_haircut.min(cap))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub pair: Address,
    pub token_reserve: U256,
    pub eth_reserve: U256,
}

/// Resolves the token/WETH pair through the router's factory and reads its
/// reserves oriented as (token, ETH).
pub async fn fetch_pool_reserves<C>(
    chain: &C,
    router: Address,
    weth: Address,
    token: Address,
) -> Result<PoolReserves, AppError>
where
    C: ChainClient + ?Sized,
{
    let raw = chain
        .call(CallRequest::new(router, UniswapV2Router02::factoryCall {}.abi_encode()))
        .await?;
    let factory = UniswapV2Router02::factoryCall::abi_decode_returns(&raw)
        .map_err(|e| AppError::chain_query("factory", e))?;

    let raw = chain
        .call(CallRequest::new(
            factory,
            IUniswapV2Factory::getPairCall {
                tokenA: token,
                tokenB: weth,
            }
            .abi_encode(),
        ))
        .await?;
    let pair = IUniswapV2Factory::getPairCall::abi_decode_returns(&raw)
        .map_err(|e| AppError::chain_query("getPair", e))?;
    if pair == Address::ZERO {
        return Err(AppError::Route(format!("no pair for {token} / WETH")));
    }

    let raw = chain
        .call(CallRequest::new(pair, IUniswapV2Pair::token0Call {}.abi_encode()))
        .await?;
    let token0 = IUniswapV2Pair::token0Call::abi_decode_returns(&raw)
        .map_err(|e| AppError::chain_query("token0", e))?;

    let raw = chain
        .call(CallRequest::new(pair, IUniswapV2Pair::getReservesCall {}.abi_encode()))
        .await?;
    let reserves = IUniswapV2Pair::getReservesCall::abi_decode_returns(&raw)
        .map_err(|e| AppError::chain_query("getReserves", e))?;
    let reserve0 = U256::from(reserves.reserve0);
    let reserve1 = U256::from(reserves.reserve1);

    let (token_reserve, eth_reserve) = if token0 == token {
        (reserve0, reserve1)
    } else {
        (reserve1, reserve0)
    };
    Ok(PoolReserves {
        pair,
        token_reserve,
        eth_reserve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_exhaustive() {
        for total in [0u64, 1, 2, 3, 2_000_000_000_000_001] {
            let total = U256::from(total);
            let (swap, lp) = split_budget(total);
            assert_eq!(swap + lp, total);
            assert_eq!(swap, total / U256::from(2u8));
        }
    }

    #[test]
    fn slippage_examples() {
        let x = U256::from(1_000_000u64);
        assert_eq!(apply_slippage(x, 0.01), U256::from(990_000u64));
        assert_eq!(apply_slippage(x, 0.0), x);
        assert_eq!(apply_slippage(x, 1.0), U256::ZERO);
        assert_eq!(apply_slippage(x, 2.0), U256::ZERO);
        assert_eq!(apply_slippage(x, -0.5), x);
    }

    #[test]
    fn slippage_is_monotonic() {
        let x = U256::from(123_456_789u64);
        let mut prev = apply_slippage(x, 0.0);
        for step in 1..=100 {
            let next = apply_slippage(x, f64::from(step) / 100.0);
            assert!(next <= prev);
            prev = next;
        }
    }

    #[test]
    fn slippage_survives_max_amount() {
        assert_eq!(apply_slippage(U256::MAX, 0.5), U256::MAX / U256::from(2u8));
        assert_eq!(apply_slippage(U256::MAX, 0.0), U256::MAX);
    }

    #[test]
    fn slippage_resolves_to_parts_per_billion() {
        let one_eth = U256::from(1_000_000_000_000_000_000u64);
        assert_eq!(slippage_ppb(0.01), 10_000_000);
        assert_eq!(slippage_ppb(f64::NAN), 0);
        assert_eq!(slippage_ppb(1e-10), 0);
        assert_eq!(apply_slippage(one_eth, 1e-10), one_eth);
        assert_eq!(slippage_ppb(1.4e-9), 1);
        assert_eq!(
            apply_slippage(one_eth, 1.4e-9),
            U256::from(999_999_999_000_000_000u64)
        );
        assert_eq!(slippage_ppb(0.0123456789), 12_345_679);
        assert_eq!(
            apply_slippage(one_eth, 0.0123456789),
            U256::from(987_654_321_000_000_000u64)
        );
    }

    #[test]
    fn slippage_floors_the_remainder() {
        // 999 × 0.99 = 989.01
        assert_eq!(apply_slippage(U256::from(999u64), 0.01), U256::from(989u64));
    }

    #[test]
    fn reserve_ratio_applies_haircut_and_cap() {
        // 1000 tokens at 1 ETH : 100 tokens -> 10 ETH, 80% -> 8 ETH.
        let amount = reserve_ratio_amount(
            U256::from(1_000u64),
            U256::from(1u64),
            U256::from(100u64),
            U256::from(1_000u64),
        );
        assert_eq!(amount.expect("amount"), U256::from(8u64));

        let capped = reserve_ratio_amount(
            U256::from(1_000u64),
            U256::from(1u64),
            U256::from(100u64),
            U256::from(5u64),
        );
        assert_eq!(capped.expect("amount"), U256::from(5u64));
    }

    #[test]
    fn reserve_ratio_rejects_empty_pool_and_overflow() {
        assert!(matches!(
            reserve_ratio_amount(U256::from(1u8), U256::ZERO, U256::from(1u8), U256::MAX),
            Err(AppError::Route(_))
        ));
        assert!(matches!(
            reserve_ratio_amount(U256::MAX, U256::from(2u8), U256::from(1u8), U256::MAX),
            Err(AppError::AmountOverflow(_))
        ));
    }

    #[test]
    fn funding_policy_parses_config_values() {
        assert_eq!(
            "reserve_ratio".parse::<LiquidityFunding>().expect("parse"),
            LiquidityFunding::ReserveRatio
        );
        assert_eq!(
            "Even-Split".parse::<LiquidityFunding>().expect("parse"),
            LiquidityFunding::EvenSplit
        );
        assert!("half".parse::<LiquidityFunding>().is_err());
    }
}
