// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::clock::Clock;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay to wait after a failed attempt (1-based) before the next one.
pub trait BackoffPolicy {
    fn delay(&self, attempt: usize) -> Duration;
}

/// `attempt × step`: 1×, 2×, 3×...
#[derive(Clone, Copy, Debug)]
pub struct LinearBackoff {
    pub step: Duration,
}

impl BackoffPolicy for LinearBackoff {
    fn delay(&self, attempt: usize) -> Duration {
        self.step
            .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }
}

/// Doubling delay starting at `initial`.
#[derive(Clone, Copy, Debug)]
pub struct ExponentialBackoff {
    pub initial: Duration,
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.initial.saturating_mul(1u32 << shift)
    }
}

#[derive(Debug)]
pub enum RetryError<E> {
    Cancelled,
    /// A non-retryable error ended the loop early.
    Aborted { attempts: usize, error: E },
    Exhausted { attempts: usize, last: E },
}

/// Retry an async operation under `policy`, sleeping on `clock` between attempts.
///
/// Cancellation is checked before every attempt and wins over a pending backoff.
/// `should_retry` lets callers stop on errors that will not improve.
pub async fn retry_async<F, Fut, T, E, P, C, R>(
    mut op: F,
    attempts: usize,
    policy: &P,
    clock: &C,
    cancel: &CancellationToken,
    should_retry: R,
) -> Result<T, RetryError<E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: BackoffPolicy,
    C: Clock,
    R: Fn(&E) -> bool,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            res = op(attempt) => res,
        };
        match result {
            Ok(v) => return Ok(v),
            Err(e) if !should_retry(&e) => {
                return Err(RetryError::Aborted { attempts: attempt, error: e });
            }
            Err(_) if attempt < attempts => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = clock.sleep(policy.delay(attempt)) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(RetryError::Exhausted { attempts: attempt, last: e }),
        }
    }
}
