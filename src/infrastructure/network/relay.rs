// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

//! Flashbots-style relay client: authenticated `eth_callBundle` simulation and
//! `eth_sendBundle` submission over JSON-RPC.

use crate::common::error::AppError;
use crate::common::parsing::{format_eth, parse_quantity};
use crate::domain::bundle::Bundle;
use crate::domain::constants::{FLASHBOTS_MAX_BYTES, FLASHBOTS_MAX_TXS, FLASHBOTS_SIGNATURE_HEADER};
use alloy::primitives::{B256, U256, keccak256};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub url: String,
    pub timeout: Duration,
    pub simulate_method: String,
    pub send_method: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTransaction {
    /// 1-based position in the bundle.
    pub index: usize,
    pub tx_hash: Option<B256>,
    pub gas_used: Option<u128>,
    pub gas_fees: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationSummary {
    pub transactions: Vec<SimulatedTransaction>,
    pub total_gas_used: u128,
    pub total_gas_fees: u128,
    pub coinbase_diff: Option<u128>,
}

#[async_trait]
pub trait BundleRelay: Send + Sync {
    async fn simulate(&self, bundle: &Bundle) -> Result<SimulationSummary, AppError>;
    /// Returns the relay's bundle hash.
    async fn send(&self, bundle: &Bundle) -> Result<String, AppError>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: [P; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallBundleParams {
    txs: Vec<String>,
    block_number: String,
    state_block_number: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBundleParams {
    txs: Vec<String>,
    block_number: String,
}

#[derive(Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallBundleResult {
    #[serde(default)]
    results: Vec<CallBundleTxResult>,
    #[serde(default)]
    total_gas_used: serde_json::Value,
    #[serde(default)]
    gas_fees: serde_json::Value,
    #[serde(default)]
    coinbase_diff: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallBundleTxResult {
    tx_hash: Option<String>,
    #[serde(default)]
    gas_used: serde_json::Value,
    #[serde(default)]
    gas_fees: serde_json::Value,
    error: Option<String>,
    revert: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBundleResult {
    bundle_hash: String,
}

/// Relay signatures put the recovery byte in the 27/28 range.
fn normalize_recovery_id(v: u8) -> u8 {
    if v < 27 { v + 27 } else { v }
}

/// `X-Flashbots-Signature` value: `<address>:0x<r || s || v>` over the EIP-191
/// hash of the hex string of `keccak256(body)`.
pub fn flashbots_signature_header(
    signer: &PrivateKeySigner,
    body: &[u8],
) -> Result<String, AppError> {
    let message = keccak256(body).to_string();
    let signature = signer
        .sign_message_sync(message.as_bytes())
        .map_err(|e| AppError::Config(format!("Relay request signing failed: {}", e)))?;

    let mut sig_bytes = [0u8; 65];
    sig_bytes[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
    sig_bytes[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
    sig_bytes[64] = normalize_recovery_id(u8::from(signature.v()));
    Ok(format!("{}:0x{}", signer.address(), hex::encode(sig_bytes)))
}

fn check_limits(bundle: &Bundle) -> Result<(), AppError> {
    let bytes = bundle.byte_len();
    if bundle.len() > FLASHBOTS_MAX_TXS || bytes > FLASHBOTS_MAX_BYTES {
        return Err(AppError::BundleLimits(format!(
            "Bundle exceeds Flashbots limits: {} txs, {} bytes (max {} tx / {} bytes)",
            bundle.len(),
            bytes,
            FLASHBOTS_MAX_TXS,
            FLASHBOTS_MAX_BYTES
        )));
    }
    Ok(())
}

/// Maps an HTTP exchange onto the result payload or a typed relay error.
fn decode_response<R: DeserializeOwned>(success: bool, status: &str, body: &str) -> Result<R, AppError> {
    let parsed: Result<JsonRpcResponse<R>, _> = serde_json::from_str(body);
    match parsed {
        Ok(JsonRpcResponse {
            error: Some(err), ..
        }) => Err(AppError::RelayProtocol {
            code: err.code,
            message: err.message,
        }),
        Ok(JsonRpcResponse {
            result: Some(result),
            ..
        }) if success => Ok(result),
        Ok(_) if success => Err(AppError::RelayProtocol {
            code: 0,
            message: "response carried neither result nor error".into(),
        }),
        Ok(_) => Err(AppError::Transport(format!("HTTP {status}: {body}"))),
        Err(e) if success => Err(AppError::Transport(format!(
            "undecodable relay response: {e}"
        ))),
        Err(_) => Err(AppError::Transport(format!("HTTP {status}: {body}"))),
    }
}

fn summarize_simulation(result: CallBundleResult) -> Result<SimulationSummary, AppError> {
    let mut transactions = Vec::with_capacity(result.results.len());
    for (i, tx) in result.results.into_iter().enumerate() {
        let index = i + 1;
        if let Some(error) = tx.error.filter(|e| !e.is_empty()) {
            return Err(AppError::Simulation {
                index,
                error,
                revert: tx.revert.unwrap_or_default(),
            });
        }
        transactions.push(SimulatedTransaction {
            index,
            tx_hash: tx.tx_hash.and_then(|h| h.parse().ok()),
            gas_used: parse_quantity(&tx.gas_used),
            gas_fees: parse_quantity(&tx.gas_fees),
        });
    }

    let summed_gas = transactions
        .iter()
        .filter_map(|t| t.gas_used)
        .fold(0u128, u128::saturating_add);
    let summed_fees = transactions
        .iter()
        .filter_map(|t| t.gas_fees)
        .fold(0u128, u128::saturating_add);

    Ok(SimulationSummary {
        total_gas_used: parse_quantity(&result.total_gas_used).unwrap_or(summed_gas),
        total_gas_fees: parse_quantity(&result.gas_fees).unwrap_or(summed_fees),
        coinbase_diff: parse_quantity(&result.coinbase_diff),
        transactions,
    })
}

/// A summary that does not cover every bundled transaction is a relay fault,
/// even when none of the reported ones reverted.
fn check_result_count(expected: usize, summary: SimulationSummary) -> Result<SimulationSummary, AppError> {
    if summary.transactions.len() != expected {
        return Err(AppError::RelayProtocol {
            code: 0,
            message: format!(
                "simulation returned {} results for {} transactions",
                summary.transactions.len(),
                expected
            ),
        });
    }
    Ok(summary)
}

/// Decodes a successful `eth_callBundle` body for a bundle of `bundle_len`
/// transactions.
pub fn parse_simulation_response(body: &str, bundle_len: usize) -> Result<SimulationSummary, AppError> {
    decode_response::<CallBundleResult>(true, "200 OK", body)
        .and_then(summarize_simulation)
        .and_then(|summary| check_result_count(bundle_len, summary))
}

pub fn parse_send_response(body: &str) -> Result<String, AppError> {
    decode_response::<SendBundleResult>(true, "200 OK", body).map(|r| r.bundle_hash)
}

pub struct FlashbotsRelayClient {
    http: reqwest::Client,
    config: RelayConfig,
    signer: PrivateKeySigner,
}

impl FlashbotsRelayClient {
    pub fn new(config: RelayConfig, signer: PrivateKeySigner) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Connection(format!("Relay HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config,
            signer,
        })
    }

    pub fn signer_address(&self) -> alloy::primitives::Address {
        self.signer.address()
    }

    async fn post<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, AppError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params: [params],
        };
        let body_bytes = serde_json::to_vec(&request)
            .map_err(|e| AppError::Transport(format!("request encoding failed: {e}")))?;
        let signature = flashbots_signature_header(&self.signer, &body_bytes)?;
        let signature = HeaderValue::from_str(&signature)
            .map_err(|e| AppError::Config(format!("Signature header invalid: {}", e)))?;

        let resp = self
            .http
            .post(&self.config.url)
            .header(CONTENT_TYPE, "application/json")
            .header(FLASHBOTS_SIGNATURE_HEADER, signature)
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Relay POST failed: {}", e)))?;

        let status = resp.status();
        let body_text = resp
            .text()
            .await
            .map_err(|e| AppError::Transport(format!("Relay body read failed: {}", e)))?;
        tracing::debug!(target: "relay", method, %status, body = %body_text, "Relay response");
        decode_response(status.is_success(), status.as_str(), &body_text)
    }
}

#[async_trait]
impl BundleRelay for FlashbotsRelayClient {
    async fn simulate(&self, bundle: &Bundle) -> Result<SimulationSummary, AppError> {
        check_limits(bundle)?;
        let params = CallBundleParams {
            txs: bundle.encoded_transactions(),
            block_number: bundle.target_block_hex(),
            state_block_number: "latest",
        };
        let result: CallBundleResult = self.post(&self.config.simulate_method, params).await?;
        let summary = check_result_count(bundle.len(), summarize_simulation(result)?)?;
        for tx in &summary.transactions {
            tracing::info!(
                target: "relay",
                tx = tx.index,
                gas_used = tx.gas_used.unwrap_or_default() as u64,
                gas_fees_eth = %format_eth(U256::from(tx.gas_fees.unwrap_or_default())),
                "Simulated transaction"
            );
        }
        tracing::info!(
            target: "relay",
            total_gas_used = summary.total_gas_used as u64,
            total_fees_eth = %format_eth(U256::from(summary.total_gas_fees)),
            "Bundle simulation succeeded"
        );
        Ok(summary)
    }

    async fn send(&self, bundle: &Bundle) -> Result<String, AppError> {
        check_limits(bundle)?;
        let params = SendBundleParams {
            txs: bundle.encoded_transactions(),
            block_number: bundle.target_block_hex(),
        };
        let result: SendBundleResult = self.post(&self.config.send_method, params).await?;
        tracing::info!(
            target: "relay",
            bundle_hash = %result.bundle_hash,
            target_block = bundle.target_block(),
            "Bundle accepted by relay"
        );
        Ok(result.bundle_hash)
    }
}
