// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::clock::Clock;
use crate::common::error::AppError;
use crate::network::chain::ReceiptSource;
use alloy::primitives::B256;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub progress_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InclusionState {
    Pending,
    Included { block_number: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionReport {
    /// Block per transaction, in bundle order.
    pub blocks: Vec<(B256, u64)>,
    pub elapsed: Duration,
}

pub struct InclusionMonitor<'a, R: ?Sized, C> {
    receipts: &'a R,
    clock: C,
    policy: InclusionPolicy,
}

impl<'a, R, C> InclusionMonitor<'a, R, C>
where
    R: ReceiptSource + ?Sized,
    C: Clock,
{
    pub fn new(receipts: &'a R, clock: C, policy: InclusionPolicy) -> Self {
        Self {
            receipts,
            clock,
            policy,
        }
    }

    pub async fn wait(
        &self,
        hashes: &[B256],
        cancel: &CancellationToken,
    ) -> Result<InclusionReport, AppError> {
        let cancelled = || AppError::Cancelled { stage: "inclusion" };
        let start = self.clock.now();
        let deadline = start + self.policy.timeout;
        let progress_every = self.policy.progress_interval.max(Duration::from_millis(1));
        let mut states = vec![InclusionState::Pending; hashes.len()];
        let mut warned_failed: HashSet<B256> = HashSet::new();
        let mut last_bucket = 0u128;

        tracing::info!(
            target: "inclusion",
            txs = hashes.len(),
            timeout_secs = self.policy.timeout.as_secs(),
            "Waiting for bundle inclusion"
        );

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            let remaining = deadline.saturating_duration_since(self.clock.now());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = self.clock.sleep(self.policy.poll_interval.min(remaining)) => {}
            }

            for (hash, state) in hashes.iter().zip(states.iter_mut()) {
                if matches!(state, InclusionState::Included { .. }) {
                    continue;
                }
                if cancel.is_cancelled() {
                    return Err(cancelled());
                }
                // A lookup may not outlive the deadline; an expired lookup counts as pending.
                let remaining = deadline.saturating_duration_since(self.clock.now());
                let lookup = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    res = self.receipts.receipt(*hash) => Some(res),
                    _ = self.clock.sleep(remaining) => None,
                };
                let Some(lookup) = lookup else {
                    tracing::debug!(target: "inclusion", tx = %hash, "Receipt lookup still running at deadline");
                    break;
                };
                match lookup {
                    Ok(Some(receipt)) if receipt.success => match receipt.block_number {
                        Some(block_number) => {
                            tracing::info!(target: "inclusion", tx = %hash, block = block_number, "Transaction included");
                            *state = InclusionState::Included { block_number };
                        }
                        None => {
                            tracing::debug!(target: "inclusion", tx = %hash, "Receipt without block number; still waiting");
                        }
                    },
                    Ok(Some(_)) => {
                        if warned_failed.insert(*hash) {
                            tracing::warn!(target: "inclusion", tx = %hash, "Receipt reports failed execution; still waiting");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(target: "inclusion", tx = %hash, error = %e, "Receipt lookup failed");
                    }
                }
            }

            let included = states
                .iter()
                .filter(|s| matches!(s, InclusionState::Included { .. }))
                .count();
            let elapsed = self.clock.now().saturating_duration_since(start);

            if included == hashes.len() {
                let blocks = hashes
                    .iter()
                    .zip(&states)
                    .filter_map(|(h, s)| match s {
                        InclusionState::Included { block_number } => Some((*h, *block_number)),
                        InclusionState::Pending => None,
                    })
                    .collect();
                tracing::info!(target: "inclusion", elapsed_ms = elapsed.as_millis() as u64, "All bundle transactions included");
                return Ok(InclusionReport { blocks, elapsed });
            }

            if self.clock.now() >= deadline {
                return Err(AppError::InclusionTimeout {
                    included,
                    total: hashes.len(),
                    timeout: self.policy.timeout,
                });
            }

            let bucket = elapsed.as_millis() / progress_every.as_millis();
            if bucket > last_bucket {
                last_bucket = bucket;
                tracing::info!(
                    target: "inclusion",
                    included,
                    total = hashes.len(),
                    elapsed_secs = elapsed.as_secs(),
                    "Inclusion progress"
                );
            }
        }
    }
}
