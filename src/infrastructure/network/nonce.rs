// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::clock::Clock;
use crate::common::error::AppError;
use crate::common::retry::{ExponentialBackoff, RetryError, retry_async};
use crate::domain::constants::{NONCE_FETCH_ATTEMPTS, NONCE_FETCH_INITIAL_DELAY};
use crate::network::chain::ChainClient;
use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;

/// Reads the payer's pending nonce; the sequencer numbers transactions from it.
pub struct NonceManager {
    address: Address,
}

impl NonceManager {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub async fn base_nonce<C, K>(
        &self,
        chain: &C,
        clock: &K,
        cancel: &CancellationToken,
    ) -> Result<u64, AppError>
    where
        C: ChainClient + ?Sized,
        K: Clock,
    {
        let address = self.address;
        let nonce = retry_async(
            |_| chain.pending_nonce(address),
            NONCE_FETCH_ATTEMPTS,
            &ExponentialBackoff {
                initial: NONCE_FETCH_INITIAL_DELAY,
            },
            clock,
            cancel,
            |_| true,
        )
        .await
        .map_err(|e| match e {
            RetryError::Cancelled => AppError::Cancelled { stage: "nonce" },
            RetryError::Aborted { error, .. } | RetryError::Exhausted { last: error, .. } => error,
        })?;

        tracing::debug!(target: "sequencer", %address, nonce, "Base nonce resolved");
        Ok(nonce)
    }
}
