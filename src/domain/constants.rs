// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, address};
use std::time::Duration;

// Common assets
pub const WETH_MAINNET: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const UNISWAP_V2_ROUTER: Address = address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D");
pub const DEFAULT_TOKEN: Address = address!("F7285d17dded63A4480A0f1F0a8cc706F02dDa0a");

// =============================================================================
// ENDPOINTS
// =============================================================================

pub const DEFAULT_RPC_URL: &str = "https://eth.llamarpc.com";
pub const FLASHBOTS_RELAY_URL: &str = "https://relay.flashbots.net";
pub const FLASHBOTS_SIGNATURE_HEADER: &str = "X-Flashbots-Signature";
pub const SIMULATE_BUNDLE_METHOD: &str = "eth_callBundle";
pub const SEND_BUNDLE_METHOD: &str = "eth_sendBundle";

// Flashbots relay bundle caps.
pub const FLASHBOTS_MAX_TXS: usize = 100;
pub const FLASHBOTS_MAX_BYTES: usize = 300_000;

// =============================================================================
// GAS & FEE CONSTANTS
// =============================================================================

pub const WEI_PER_GWEI: u128 = 1_000_000_000;
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Pre-London networks get the suggested gas price bumped by 50%.
pub const LEGACY_GAS_PRICE_BUMP_BPS: u128 = 15_000;

pub const DEFAULT_PRIORITY_FEE_MULTIPLIER_BPS: u64 = 30_000;
pub const DEFAULT_BASE_FEE_MULTIPLIER_BPS: u64 = 25_000;
pub const DEFAULT_MIN_PRIORITY_FEE_GWEI: f64 = 2.0;
pub const DEFAULT_MAX_PRIORITY_FEE_GWEI: f64 = 50.0;
pub const DEFAULT_GAS_LIMIT_BUFFER_PERCENT: u64 = 30;

// Fallback gas limits when eth_estimateGas keeps failing (before buffer).
pub const DEFAULT_APPROVE_GAS: u64 = 60_000;
pub const DEFAULT_SWAP_GAS: u64 = 300_000;
pub const DEFAULT_ADD_LIQUIDITY_GAS: u64 = 400_000;

pub const GAS_ESTIMATE_ATTEMPTS: usize = 3;
pub const GAS_ESTIMATE_BACKOFF_STEP: Duration = Duration::from_millis(500);

// =============================================================================
// SUBMISSION & INCLUSION
// =============================================================================

pub const DEFAULT_SEND_MAX_RETRIES: usize = 3;
pub const SEND_BACKOFF_STEP: Duration = Duration::from_secs(1);
pub const DEFAULT_RELAY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 1_000;
pub const DEFAULT_INCLUSION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PROGRESS_LOG_SECS: u64 = 5;

pub const NONCE_FETCH_ATTEMPTS: usize = 3;
pub const NONCE_FETCH_INITIAL_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// SWAP DEFAULTS
// =============================================================================

pub const DEFAULT_ETH_AMOUNT: &str = "0.002";
pub const DEFAULT_SLIPPAGE: f64 = 0.01;
pub const DEFAULT_DEADLINE_SECONDS: u64 = 120;

/// Share of the reserve-ratio ETH amount actually committed to the pool.
pub const RESERVE_RATIO_HAIRCUT_PERCENT: u64 = 80;
