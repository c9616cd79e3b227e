// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Read-only chain access used by the pipeline. The HTTP provider implements
//! both traits; tests substitute in-memory fakes.

use crate::common::error::AppError;
use crate::network::provider::HttpProvider;
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::types::BlockNumberOrTag;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadSnapshot {
    pub number: u64,
    /// `None` before the London fork (or on chains without a fee market).
    pub base_fee_per_gas: Option<u128>,
}

/// Minimal call shape for `eth_call` / `eth_estimateGas`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl CallRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            value: U256::ZERO,
            data: data.into(),
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    fn into_request(self) -> TransactionRequest {
        TransactionRequest {
            from: self.from,
            to: Some(TxKind::Call(self.to)),
            value: Some(self.value),
            input: TransactionInput::new(self.data),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptStatus {
    pub success: bool,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, AppError>;
    async fn latest_head(&self) -> Result<HeadSnapshot, AppError>;
    async fn max_priority_fee_per_gas(&self) -> Result<u128, AppError>;
    async fn gas_price(&self) -> Result<u128, AppError>;
    async fn pending_nonce(&self, address: Address) -> Result<u64, AppError>;
    async fn call(&self, request: CallRequest) -> Result<Bytes, AppError>;
    async fn estimate_gas(&self, request: CallRequest) -> Result<u64, AppError>;
}

#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// `Ok(None)` while the transaction is unknown or not yet mined.
    async fn receipt(&self, hash: B256) -> Result<Option<ReceiptStatus>, AppError>;
}

#[async_trait]
impl ChainClient for HttpProvider {
    async fn chain_id(&self) -> Result<u64, AppError> {
        self.get_chain_id()
            .await
            .map_err(|e| AppError::chain_query("eth_chainId", e))
    }

    async fn latest_head(&self) -> Result<HeadSnapshot, AppError> {
        let block = self
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| AppError::chain_query("eth_getBlockByNumber", e))?
            .ok_or_else(|| AppError::chain_query("eth_getBlockByNumber", "latest block missing"))?;
        Ok(HeadSnapshot {
            number: block.header.number,
            base_fee_per_gas: block.header.base_fee_per_gas.map(u128::from),
        })
    }

    async fn max_priority_fee_per_gas(&self) -> Result<u128, AppError> {
        self.get_max_priority_fee_per_gas()
            .await
            .map_err(|e| AppError::chain_query("eth_maxPriorityFeePerGas", e))
    }

    async fn gas_price(&self) -> Result<u128, AppError> {
        self.get_gas_price()
            .await
            .map_err(|e| AppError::chain_query("eth_gasPrice", e))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, AppError> {
        self.get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| AppError::chain_query("eth_getTransactionCount", e))
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes, AppError> {
        Provider::call(self, request.into_request())
            .await
            .map_err(|e| AppError::chain_query("eth_call", e))
    }

    async fn estimate_gas(&self, request: CallRequest) -> Result<u64, AppError> {
        Provider::estimate_gas(self, request.into_request())
            .await
            .map_err(|e| AppError::GasEstimation(e.to_string()))
    }
}

#[async_trait]
impl ReceiptSource for HttpProvider {
    async fn receipt(&self, hash: B256) -> Result<Option<ReceiptStatus>, AppError> {
        let receipt = self
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| AppError::chain_query("eth_getTransactionReceipt", e))?;
        Ok(receipt.map(|r| ReceiptStatus {
            success: r.status(),
            block_number: r.block_number,
        }))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_request_maps_to_transaction_request() {
        let to = Address::repeat_byte(0x11);
        let from = Address::repeat_byte(0x22);
        let req = CallRequest::new(to, vec![0xde, 0xad])
            .from(from)
            .value(U256::from(5u64))
            .into_request();
        assert_eq!(req.to, Some(TxKind::Call(to)));
        assert_eq!(req.from, Some(from));
        assert_eq!(req.value, Some(U256::from(5u64)));
        assert_eq!(
            req.input.into_input().map(|b| b.to_vec()),
            Some(vec![0xde, 0xad])
        );
    }
}
