// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::clock::Clock;
use crate::common::error::AppError;
use crate::common::parsing::format_eth;
use crate::common::retry::{LinearBackoff, RetryError, retry_async};
use crate::data::abi::{IERC20, UniswapV2Router02};
use crate::domain::bundle::{BundleLeg, SignedTransaction, TransactionSpec};
use crate::network::chain::{CallRequest, ChainClient};
use crate::network::gas::GasParams;
use crate::services::bundle::liquidity::{
    LiquidityFunding, apply_slippage, fetch_pool_reserves, reserve_ratio_amount, split_budget,
};
use crate::services::bundle::signing::sign_spec;
use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    pub router: Address,
    pub weth: Address,
    pub gas_limit_buffer_percent: u64,
    pub liquidity_funding: LiquidityFunding,
    pub estimate_attempts: usize,
    pub estimate_backoff_step: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerInput {
    pub base_nonce: u64,
    pub payer: Address,
    pub chain_id: u64,
    pub token: Address,
    /// Total ETH (wei) split between the swap and the liquidity leg.
    pub budget: U256,
    pub slippage: f64,
    /// Unix seconds.
    pub deadline: u64,
    pub gas_params: GasParams,
}

/// Amounts derived from the router quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPlan {
    pub amount_for_swap: U256,
    pub eth_for_lp: U256,
    pub expected_out: U256,
    pub min_token_out: U256,
    pub min_eth_for_lp: U256,
}

pub fn buffered_gas_limit(gas: u64, buffer_percent: u64) -> u64 {
    let scaled = u128::from(gas) * u128::from(100u64.saturating_add(buffer_percent)) / 100;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

pub struct TransactionSequencer<'a, C: ?Sized, K> {
    chain: &'a C,
    clock: K,
    config: SequencerConfig,
}

impl<'a, C, K> TransactionSequencer<'a, C, K>
where
    C: ChainClient + ?Sized,
    K: Clock,
{
    pub fn new(chain: &'a C, clock: K, config: SequencerConfig) -> Self {
        Self {
            chain,
            clock,
            config,
        }
    }

    pub async fn plan(&self, input: &SequencerInput) -> Result<SwapPlan, AppError> {
        let (amount_for_swap, remainder) = split_budget(input.budget);
        let path = vec![self.config.weth, input.token];

        let quote = UniswapV2Router02::getAmountsOutCall {
            amountIn: amount_for_swap,
            path,
        }
        .abi_encode();
        let raw = self
            .chain
            .call(CallRequest::new(self.config.router, quote))
            .await?;
        let amounts = UniswapV2Router02::getAmountsOutCall::abi_decode_returns(&raw)
            .map_err(|e| AppError::chain_query("getAmountsOut", e))?;
        if amounts.len() < 2 {
            return Err(AppError::Route(format!(
                "getAmountsOut returned {} amounts",
                amounts.len()
            )));
        }
        let expected_out = amounts[1];
        if expected_out.is_zero() {
            return Err(AppError::Route(format!(
                "zero output for {} wei into {}",
                amount_for_swap, input.token
            )));
        }

        let eth_for_lp = match self.config.liquidity_funding {
            LiquidityFunding::EvenSplit => remainder,
            LiquidityFunding::ReserveRatio => {
                let pool = fetch_pool_reserves(
                    self.chain,
                    self.config.router,
                    self.config.weth,
                    input.token,
                )
                .await?;
                tracing::debug!(
                    target: "sequencer",
                    pair = %pool.pair,
                    token_reserve = %pool.token_reserve,
                    eth_reserve = %pool.eth_reserve,
                    "Pool reserves"
                );
                reserve_ratio_amount(expected_out, pool.eth_reserve, pool.token_reserve, remainder)?
            }
        };

        let plan = SwapPlan {
            amount_for_swap,
            eth_for_lp,
            expected_out,
            min_token_out: apply_slippage(expected_out, input.slippage),
            min_eth_for_lp: apply_slippage(eth_for_lp, input.slippage),
        };
        tracing::info!(
            target: "sequencer",
            swap_eth = %format_eth(plan.amount_for_swap),
            lp_eth = %format_eth(plan.eth_for_lp),
            expected_out = %plan.expected_out,
            min_out = %plan.min_token_out,
            funding = %self.config.liquidity_funding,
            "Swap plan"
        );
        Ok(plan)
    }

    /// Specs carry the unbuffered per-leg default until estimation runs.
    pub fn build_specs(
        &self,
        input: &SequencerInput,
        plan: &SwapPlan,
    ) -> Result<Vec<TransactionSpec>, AppError> {
        let deadline = U256::from(input.deadline);
        let router = self.config.router;

        BundleLeg::ORDER
            .iter()
            .enumerate()
            .map(|(i, leg)| -> Result<TransactionSpec, AppError> {
                let (to, value, data) = match leg {
                    BundleLeg::Approve => (
                        input.token,
                        U256::ZERO,
                        IERC20::approveCall {
                            spender: router,
                            amount: plan.expected_out,
                        }
                        .abi_encode(),
                    ),
                    BundleLeg::Swap => (
                        router,
                        plan.amount_for_swap,
                        UniswapV2Router02::swapExactETHForTokensCall {
                            amountOutMin: plan.min_token_out,
                            path: vec![self.config.weth, input.token],
                            to: input.payer,
                            deadline,
                        }
                        .abi_encode(),
                    ),
                    BundleLeg::AddLiquidity => (
                        router,
                        plan.eth_for_lp,
                        UniswapV2Router02::addLiquidityETHCall {
                            token: input.token,
                            amountTokenDesired: plan.expected_out,
                            amountTokenMin: plan.min_token_out,
                            amountETHMin: plan.min_eth_for_lp,
                            to: input.payer,
                            deadline,
                        }
                        .abi_encode(),
                    ),
                };
                let nonce = input
                    .base_nonce
                    .checked_add(i as u64)
                    .ok_or_else(|| AppError::AmountOverflow(format!("{leg} nonce")))?;
                Ok(TransactionSpec {
                    leg: *leg,
                    nonce,
                    to,
                    value,
                    data: Bytes::from(data),
                    gas_limit: leg.default_gas_limit(),
                    gas_params: input.gas_params,
                })
            })
            .collect()
    }

    async fn resolve_gas_limit(
        &self,
        spec: &TransactionSpec,
        payer: Address,
        cancel: &CancellationToken,
    ) -> Result<u64, AppError> {
        let request = CallRequest::new(spec.to, spec.data.clone())
            .from(payer)
            .value(spec.value);
        let buffer = self.config.gas_limit_buffer_percent;
        let estimated = retry_async(
            |_| self.chain.estimate_gas(request.clone()),
            self.config.estimate_attempts,
            &LinearBackoff {
                step: self.config.estimate_backoff_step,
            },
            &self.clock,
            cancel,
            |_| true,
        )
        .await;

        match estimated {
            Ok(gas) => Ok(buffered_gas_limit(gas, buffer)),
            Err(RetryError::Cancelled) => Err(AppError::Cancelled { stage: "sequencing" }),
            Err(RetryError::Aborted { error, .. } | RetryError::Exhausted { last: error, .. }) => {
                let fallback = buffered_gas_limit(spec.leg.default_gas_limit(), buffer);
                tracing::warn!(
                    target: "sequencer",
                    leg = %spec.leg,
                    error = %error,
                    gas_limit = fallback,
                    "Gas estimation failed; using default limit"
                );
                Ok(fallback)
            }
        }
    }

    /// Plans, builds, prices and signs the three bundle transactions.
    pub async fn sequence(
        &self,
        input: &SequencerInput,
        signer: &PrivateKeySigner,
        cancel: &CancellationToken,
    ) -> Result<Vec<SignedTransaction>, AppError> {
        let plan = self.plan(input).await?;
        let mut specs = self.build_specs(input, &plan)?;
        for spec in specs.iter_mut() {
            spec.gas_limit = self.resolve_gas_limit(spec, input.payer, cancel).await?;
            tracing::debug!(
                target: "sequencer",
                leg = %spec.leg,
                nonce = spec.nonce,
                gas_limit = spec.gas_limit,
                "Transaction prepared"
            );
        }

        specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| sign_spec(spec, input.chain_id, signer, i + 1))
            .collect()
    }
}
