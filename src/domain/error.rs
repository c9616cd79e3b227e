// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    /// Fee, nonce, header or contract-read failure. Fatal for the run.
    #[error("Chain query `{query}` failed: {message}")]
    ChainQuery { query: &'static str, message: String },

    #[error("Swap route unusable: {0}")]
    Route(String),

    #[error("Amount overflow while computing {0}")]
    AmountOverflow(String),

    #[error("Signing transaction {index} failed: {reason}")]
    Signing { index: usize, reason: String },

    /// Absorbed by the sequencer; never ends a run on its own.
    #[error("Gas estimation failed: {0}")]
    GasEstimation(String),

    /// `index` is the 1-based position of the failing transaction in the bundle.
    #[error("Transaction {index} simulation error: {error} - {revert}")]
    Simulation {
        index: usize,
        error: String,
        revert: String,
    },

    #[error("Relay error {code}: {message}")]
    RelayProtocol { code: i64, message: String },

    #[error("Relay transport failed: {0}")]
    Transport(String),

    #[error("Bundle rejected locally: {0}")]
    BundleLimits(String),

    #[error("Failed to send bundle after {attempts} attempts: {last}")]
    SendExhausted { attempts: usize, last: Box<AppError> },

    #[error("Bundle inclusion timeout after {timeout:?} (included: {included}/{total})")]
    InclusionTimeout {
        included: usize,
        total: usize,
        timeout: Duration,
    },

    #[error("Cancelled during {stage}")]
    Cancelled { stage: &'static str },
}

impl AppError {
    pub fn chain_query(query: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::ChainQuery {
            query,
            message: err.to_string(),
        }
    }

    /// Errors the send loop may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::RelayProtocol { .. } | AppError::Transport(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled { .. })
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
