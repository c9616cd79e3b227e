// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! One end-to-end bundle run: fees, nonce, sequencing, simulation, submission
//! and inclusion, strictly in that order.

use crate::common::clock::{Clock, current_unix};
use crate::common::error::AppError;
use crate::common::parsing::format_eth;
use crate::domain::bundle::Bundle;
use crate::network::chain::{ChainClient, ReceiptSource};
use crate::network::gas::{FeeOracle, FeePolicy};
use crate::network::inclusion::{InclusionMonitor, InclusionPolicy, InclusionReport};
use crate::network::nonce::NonceManager;
use crate::network::relay::{BundleRelay, SimulationSummary};
use crate::services::bundle::sequencer::{SequencerConfig, SequencerInput, TransactionSequencer};
pub use crate::services::bundle::submission::SubmissionStatus;
use crate::services::bundle::submission::{RetryCoordinator, SubmissionPolicy};
use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Fees,
    Nonce,
    Sequencing,
    Simulation,
    Submission,
    Inclusion,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Fees => "fees",
            PipelineStage::Nonce => "nonce",
            PipelineStage::Sequencing => "sequencing",
            PipelineStage::Simulation => "simulation",
            PipelineStage::Submission => "submission",
            PipelineStage::Inclusion => "inclusion",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: AppError,
    submission: SubmissionStatus,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, source: AppError) -> Self {
        let submission = match stage {
            PipelineStage::Inclusion => SubmissionStatus::SentUnconfirmed,
            _ => SubmissionStatus::NotSent,
        };
        Self {
            stage,
            source,
            submission,
        }
    }

    fn with_submission(mut self, submission: SubmissionStatus) -> Self {
        self.submission = submission;
        self
    }

    pub fn submission(&self) -> SubmissionStatus {
        self.submission
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub fee_policy: FeePolicy,
    pub sequencer: SequencerConfig,
    pub submission: SubmissionPolicy,
    pub inclusion: InclusionPolicy,
    pub token: Address,
    pub budget: U256,
    pub slippage: f64,
    pub deadline_seconds: u64,
    /// Simulate only.
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub chain_id: u64,
    pub base_nonce: u64,
    pub target_block: u64,
    pub tx_hashes: Vec<B256>,
    /// `None` in dry-run.
    pub bundle_hash: Option<String>,
    pub simulation: SimulationSummary,
    /// `None` in dry-run.
    pub inclusion: Option<InclusionReport>,
}

async fn guarded<T, F>(
    stage: PipelineStage,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, AppError>>,
{
    let wrap = |source| PipelineError::new(stage, source);
    if cancel.is_cancelled() {
        return Err(wrap(AppError::Cancelled {
            stage: stage.as_str(),
        }));
    }
    let res = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled { stage: stage.as_str() }),
        res = fut => res,
    };
    res.map_err(wrap)
}

pub struct BundlePipeline<'a, C: ?Sized, R: ?Sized, L: ?Sized, K> {
    chain: &'a C,
    receipts: &'a R,
    relay: &'a L,
    clock: K,
    settings: PipelineSettings,
}

impl<'a, C, R, L, K> BundlePipeline<'a, C, R, L, K>
where
    C: ChainClient + ?Sized,
    R: ReceiptSource + ?Sized,
    L: BundleRelay + ?Sized,
    K: Clock,
{
    pub fn new(
        chain: &'a C,
        receipts: &'a R,
        relay: &'a L,
        clock: K,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            chain,
            receipts,
            relay,
            clock,
            settings,
        }
    }

    pub async fn run(
        &self,
        wallet: &PrivateKeySigner,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport, PipelineError> {
        let settings = &self.settings;
        let payer = wallet.address();
        tracing::info!(
            target: "pipeline",
            %payer,
            token = %settings.token,
            budget_eth = %format_eth(settings.budget),
            dry_run = settings.dry_run,
            "Starting bundle run"
        );

        let oracle = FeeOracle::new(settings.fee_policy);
        let (chain_id, fees) = guarded(PipelineStage::Fees, cancel, async {
            let chain_id = self.chain.chain_id().await?;
            let fees = oracle.read(self.chain).await?;
            Ok::<_, AppError>((chain_id, fees))
        })
        .await?;

        let nonces = NonceManager::new(payer);
        let base_nonce = guarded(
            PipelineStage::Nonce,
            cancel,
            nonces.base_nonce(self.chain, &self.clock, cancel),
        )
        .await?;

        let sequencer =
            TransactionSequencer::new(self.chain, &self.clock, settings.sequencer.clone());
        let input = SequencerInput {
            base_nonce,
            payer,
            chain_id,
            token: settings.token,
            budget: settings.budget,
            slippage: settings.slippage,
            deadline: current_unix().saturating_add(settings.deadline_seconds),
            gas_params: fees.params,
        };
        let bundle = guarded(PipelineStage::Sequencing, cancel, async {
            let signed = sequencer.sequence(&input, wallet, cancel).await?;
            Bundle::new(signed, fees.head.number)
        })
        .await?;

        tracing::info!(
            target: "pipeline",
            txs = bundle.len(),
            total_gas = bundle.total_gas_limit(),
            max_fee_eth = %format_eth(bundle.max_fee_wei()),
            target_block = bundle.target_block(),
            "Bundle cost estimate"
        );

        let simulation = guarded(
            PipelineStage::Simulation,
            cancel,
            self.relay.simulate(&bundle),
        )
        .await?;

        let mut report = PipelineReport {
            chain_id,
            base_nonce,
            target_block: bundle.target_block(),
            tx_hashes: bundle.hashes(),
            bundle_hash: None,
            simulation,
            inclusion: None,
        };

        if settings.dry_run {
            tracing::info!(target: "pipeline", "Dry-run: bundle simulated, not sent");
            return Ok(report);
        }

        let coordinator = RetryCoordinator::new(&self.clock, settings.submission);
        let bundle_hash = guarded(
            PipelineStage::Submission,
            cancel,
            coordinator.send(self.relay, &bundle, cancel),
        )
        .await
        .map_err(|err| err.with_submission(coordinator.delivery()))?;
        report.bundle_hash = Some(bundle_hash);

        let monitor = InclusionMonitor::new(self.receipts, &self.clock, settings.inclusion);
        let inclusion = guarded(
            PipelineStage::Inclusion,
            cancel,
            monitor.wait(&report.tx_hashes, cancel),
        )
        .await?;
        report.inclusion = Some(inclusion);

        tracing::info!(
            target: "pipeline",
            bundle_hash = report.bundle_hash.as_deref().unwrap_or_default(),
            target_block = report.target_block,
            "Bundle included"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_decides_default_delivery() {
        let err = |stage| PipelineError::new(stage, AppError::Transport("x".into()));
        assert_eq!(err(PipelineStage::Simulation).submission(), SubmissionStatus::NotSent);
        assert_eq!(err(PipelineStage::Submission).submission(), SubmissionStatus::NotSent);
        assert_eq!(
            err(PipelineStage::Inclusion).submission(),
            SubmissionStatus::SentUnconfirmed
        );
        let uncertain = err(PipelineStage::Submission).with_submission(SubmissionStatus::PossiblySent);
        assert_eq!(uncertain.submission(), SubmissionStatus::PossiblySent);
    }

    #[tokio::test]
    async fn guarded_stage_reports_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = guarded(PipelineStage::Nonce, &cancel, async { Ok::<_, AppError>(1) })
            .await
            .expect_err("cancelled");
        assert_eq!(err.stage, PipelineStage::Nonce);
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "nonce stage failed: Cancelled during nonce");
    }
}
