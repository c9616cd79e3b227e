// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::clock::Clock;
use crate::common::error::AppError;
use crate::common::retry::{LinearBackoff, RetryError, retry_async};
use crate::domain::bundle::Bundle;
use crate::network::relay::BundleRelay;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionPolicy {
    pub max_retries: usize,
    pub backoff_step: Duration,
}

/// What the relay may have received when a run stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    NotSent,
    /// An attempt failed in transit or was cut off mid-request; the relay may hold the bundle.
    PossiblySent,
    /// The relay accepted the bundle but inclusion was not confirmed.
    SentUnconfirmed,
}

/// Errors that prove the relay did not take the bundle.
fn rejected_before_acceptance(err: &AppError) -> bool {
    matches!(err, AppError::RelayProtocol { .. } | AppError::BundleLimits(_))
}

/// Bounded retry around `eth_sendBundle`. Simulation is never routed through here.
pub struct RetryCoordinator<K> {
    clock: K,
    policy: SubmissionPolicy,
    started: AtomicUsize,
    rejected: AtomicUsize,
}

impl<K: Clock> RetryCoordinator<K> {
    pub fn new(clock: K, policy: SubmissionPolicy) -> Self {
        Self {
            clock,
            policy,
            started: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
        }
    }

    /// Delivery state after a failed or interrupted `send`.
    pub fn delivery(&self) -> SubmissionStatus {
        let started = self.started.load(Ordering::Relaxed);
        if started == self.rejected.load(Ordering::Relaxed) {
            SubmissionStatus::NotSent
        } else {
            SubmissionStatus::PossiblySent
        }
    }

    pub async fn send<R>(
        &self,
        relay: &R,
        bundle: &Bundle,
        cancel: &CancellationToken,
    ) -> Result<String, AppError>
    where
        R: BundleRelay + ?Sized,
    {
        let attempts = self.policy.max_retries.max(1);
        self.started.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        let (started, rejected) = (&self.started, &self.rejected);
        let result = retry_async(
            |attempt| async move {
                tracing::info!(
                    target: "submission",
                    attempt,
                    max = attempts,
                    target_block = bundle.target_block(),
                    "Sending bundle"
                );
                started.fetch_add(1, Ordering::Relaxed);
                let res = relay.send(bundle).await;
                if let Err(e) = &res {
                    if rejected_before_acceptance(e) {
                        rejected.fetch_add(1, Ordering::Relaxed);
                    }
                    tracing::warn!(target: "submission", attempt, error = %e, "Bundle send failed");
                }
                res
            },
            attempts,
            &LinearBackoff {
                step: self.policy.backoff_step,
            },
            &self.clock,
            cancel,
            AppError::is_retryable,
        )
        .await;

        match result {
            Ok(hash) => Ok(hash),
            Err(RetryError::Cancelled) => Err(AppError::Cancelled { stage: "submission" }),
            Err(RetryError::Aborted { error, .. }) => Err(error),
            Err(RetryError::Exhausted { attempts, last }) => Err(AppError::SendExhausted {
                attempts,
                last: Box::new(last),
            }),
        }
    }
}
