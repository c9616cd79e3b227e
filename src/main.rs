// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use oxidity_bundler::app::config::{GlobalSettings, SettingsOverrides};
use oxidity_bundler::app::logging::setup_logging;
use oxidity_bundler::common::clock::TokioClock;
use oxidity_bundler::common::parsing::format_eth;
use oxidity_bundler::domain::error::AppError;
use oxidity_bundler::infrastructure::network::provider::ConnectionFactory;
use oxidity_bundler::infrastructure::network::relay::FlashbotsRelayClient;
use oxidity_bundler::services::bundle::pipeline::{BundlePipeline, SubmissionStatus};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "private approve/swap/add-liquidity bundle submitter")]
struct Cli {
    /// Path to config file (default: config.prod.toml, config.dev.toml or config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Private key of the paying account
    #[arg(long, env = "EOA_PRIVATE_KEY", hide_env_values = true)]
    eoa_key: Option<String>,

    /// Private key that authenticates relay requests
    #[arg(long, env = "FLASHBOTS_SIGNER_KEY", hide_env_values = true)]
    flashbots_key: Option<String>,

    /// Token bought and paired with ETH
    #[arg(long)]
    token: Option<Address>,

    /// Total ETH for the run (decimal ether, e.g. 0.002)
    #[arg(long)]
    eth_amount: Option<String>,

    /// Slippage tolerance as a fraction (0.01 = 1%)
    #[arg(long)]
    slippage: Option<f64>,

    /// Seconds from now until the router calls expire
    #[arg(long)]
    deadline_seconds: Option<u64>,

    /// Simulate the bundle but never send it
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    settings.apply_overrides(SettingsOverrides {
        eoa_key: cli.eoa_key,
        flashbots_key: cli.flashbots_key,
        token: cli.token,
        eth_amount: cli.eth_amount,
        slippage: cli.slippage,
        deadline_seconds: cli.deadline_seconds,
    });
    setup_logging(settings.log_level(), settings.log_json);
    settings.validate()?;

    let wallet = PrivateKeySigner::from_str(settings.wallet_key()?)
        .map_err(|e| AppError::Config(format!("Invalid wallet key: {}", e)))?;
    let bundle_signer = PrivateKeySigner::from_str(settings.bundle_signer_key()?)
        .map_err(|e| AppError::Config(format!("Invalid bundle signer key: {}", e)))?;

    let provider = ConnectionFactory::http(&settings.rpc_url, settings.rpc_timeout())?;
    let relay = FlashbotsRelayClient::new(settings.relay_config(), bundle_signer)?;
    let pipeline_settings = settings.pipeline_settings(cli.dry_run)?;

    tracing::info!(
        target: "pipeline",
        wallet = %wallet.address(),
        relay_signer = %relay.signer_address(),
        rpc = %settings.rpc_url,
        relay = %settings.relay_url,
        eth_amount = %format_eth(pipeline_settings.budget),
        "Configuration loaded"
    );

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "pipeline", "Interrupt received; cancelling run");
            ctrl_c_token.cancel();
        }
    });

    let pipeline = BundlePipeline::new(&provider, &provider, &relay, TokioClock, pipeline_settings);
    match pipeline.run(&wallet, &shutdown).await {
        Ok(report) => {
            tracing::info!(
                target: "pipeline",
                chain_id = report.chain_id,
                base_nonce = report.base_nonce,
                target_block = report.target_block,
                bundle_hash = report.bundle_hash.as_deref().unwrap_or("-"),
                txs = report.tx_hashes.len(),
                "Run complete"
            );
            for hash in &report.tx_hashes {
                tracing::info!(target: "pipeline", tx = %hash, "Bundle transaction");
            }
            Ok(())
        }
        Err(err) => {
            let sent = match err.submission() {
                SubmissionStatus::NotSent => "not sent",
                SubmissionStatus::PossiblySent => "possibly sent, relay outcome unknown",
                SubmissionStatus::SentUnconfirmed => "sent, inclusion unconfirmed",
            };
            tracing::error!(
                target: "pipeline",
                stage = %err.stage,
                bundle = sent,
                error = %err.source,
                "Run failed"
            );
            Err(err.source)
        }
    }
}
