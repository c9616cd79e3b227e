// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Transaction and bundle types shared by the sequencer, the relay client and
//! the inclusion monitor. Nothing here outlives a single pipeline run.

use crate::domain::constants::{
    DEFAULT_ADD_LIQUIDITY_GAS, DEFAULT_APPROVE_GAS, DEFAULT_SWAP_GAS,
};
use crate::domain::error::AppError;
use crate::infrastructure::network::gas::GasParams;
use alloy::primitives::{Address, B256, Bytes, U256};
use std::fmt;

/// The three fixed operations of a bundle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleLeg {
    Approve,
    Swap,
    AddLiquidity,
}

impl BundleLeg {
    pub const ORDER: [BundleLeg; 3] = [BundleLeg::Approve, BundleLeg::Swap, BundleLeg::AddLiquidity];

    pub fn default_gas_limit(self) -> u64 {
        match self {
            BundleLeg::Approve => DEFAULT_APPROVE_GAS,
            BundleLeg::Swap => DEFAULT_SWAP_GAS,
            BundleLeg::AddLiquidity => DEFAULT_ADD_LIQUIDITY_GAS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BundleLeg::Approve => "approve",
            BundleLeg::Swap => "swap",
            BundleLeg::AddLiquidity => "addLiquidity",
        }
    }
}

impl fmt::Display for BundleLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSpec {
    pub leg: BundleLeg,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    pub gas_params: GasParams,
}

impl TransactionSpec {
    /// Worst-case fee this transaction can be charged.
    pub fn max_fee_wei(&self) -> U256 {
        U256::from(self.gas_params.max_price_per_gas()) * U256::from(self.gas_limit)
    }
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub spec: TransactionSpec,
    /// EIP-2718 encoding, ready for the relay.
    pub raw: Bytes,
    pub hash: B256,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

#[derive(Debug, Clone)]
pub struct Bundle {
    transactions: Vec<SignedTransaction>,
    target_block: u64,
}

impl Bundle {
    /// Builds a bundle aimed at the block after `current_head`.
    ///
    /// Rejects empty input and any gap or reordering in the nonce sequence.
    pub fn new(transactions: Vec<SignedTransaction>, current_head: u64) -> Result<Self, AppError> {
        let Some(first) = transactions.first() else {
            return Err(AppError::BundleLimits("bundle has no transactions".into()));
        };
        let base = first.spec.nonce;
        for (i, tx) in transactions.iter().enumerate() {
            let expected = base.saturating_add(i as u64);
            if tx.spec.nonce != expected {
                return Err(AppError::BundleLimits(format!(
                    "transaction {} has nonce {} (expected {})",
                    i + 1,
                    tx.spec.nonce,
                    expected
                )));
            }
        }
        let target_block = current_head
            .checked_add(1)
            .ok_or_else(|| AppError::AmountOverflow("target block number".into()))?;
        Ok(Self {
            transactions,
            target_block,
        })
    }

    pub fn transactions(&self) -> &[SignedTransaction] {
        &self.transactions
    }

    pub fn target_block(&self) -> u64 {
        self.target_block
    }

    pub fn target_block_hex(&self) -> String {
        format!("0x{:x}", self.target_block)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn encoded_transactions(&self) -> Vec<String> {
        self.transactions.iter().map(SignedTransaction::raw_hex).collect()
    }

    pub fn hashes(&self) -> Vec<B256> {
        self.transactions.iter().map(|tx| tx.hash).collect()
    }

    pub fn byte_len(&self) -> usize {
        self.transactions.iter().map(|tx| tx.raw.len()).sum()
    }

    pub fn total_gas_limit(&self) -> u64 {
        self.transactions
            .iter()
            .map(|tx| tx.spec.gas_limit)
            .fold(0u64, u64::saturating_add)
    }

    pub fn max_fee_wei(&self) -> U256 {
        self.transactions
            .iter()
            .map(|tx| tx.spec.max_fee_wei())
            .fold(U256::ZERO, U256::saturating_add)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn signed(leg: BundleLeg, nonce: u64, fill: u8) -> SignedTransaction {
        SignedTransaction {
            spec: TransactionSpec {
                leg,
                nonce,
                to: Address::repeat_byte(fill),
                value: U256::ZERO,
                data: Bytes::new(),
                gas_limit: 21_000,
                gas_params: GasParams::Legacy { gas_price: 10 },
            },
            raw: Bytes::from(vec![0x02, fill]),
            hash: B256::repeat_byte(fill),
        }
    }

    pub fn three_leg_bundle(base_nonce: u64, head: u64) -> Bundle {
        let txs = BundleLeg::ORDER
            .iter()
            .enumerate()
            .map(|(i, leg)| signed(*leg, base_nonce + i as u64, i as u8 + 1))
            .collect();
        Bundle::new(txs, head).expect("valid bundle")
    }
}
