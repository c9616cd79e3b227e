// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::parsing::{gwei_to_wei, parse_ether_amount};
use crate::domain::constants;
use crate::domain::error::AppError;
use crate::network::gas::FeePolicy;
use crate::network::inclusion::InclusionPolicy;
use crate::network::relay::RelayConfig;
use crate::services::bundle::liquidity::LiquidityFunding;
use crate::services::bundle::pipeline::PipelineSettings;
use crate::services::bundle::sequencer::SequencerConfig;
use crate::services::bundle::submission::SubmissionPolicy;
use alloy::primitives::{Address, U256};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,

    // Endpoints
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    #[serde(default = "default_simulate_method")]
    pub simulate_method: String,
    #[serde(default = "default_send_method")]
    pub send_method: String,

    // Identity
    pub wallet_key: Option<String>,
    pub eoa_private_key: Option<String>,
    pub bundle_signer_key: Option<String>,
    pub flashbots_signer_key: Option<String>,

    // Swap
    #[serde(default = "default_token")]
    pub token_address: Address,
    #[serde(default = "default_router")]
    pub router_address: Address,
    #[serde(default = "default_weth")]
    pub weth_address: Address,
    /// Total ETH for the run, as a decimal ether string.
    #[serde(default = "default_eth_amount")]
    pub eth_amount: String,
    #[serde(default = "default_slippage")]
    pub slippage: f64,
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: u64,
    #[serde(default = "default_liquidity_funding")]
    pub liquidity_funding: String,

    // Fees
    #[serde(default = "default_priority_fee_multiplier_bps")]
    pub priority_fee_multiplier_bps: u64,
    #[serde(default = "default_base_fee_multiplier_bps")]
    pub base_fee_multiplier_bps: u64,
    #[serde(default = "default_min_priority_fee_gwei")]
    pub min_priority_fee_gwei: f64,
    #[serde(default = "default_max_priority_fee_gwei")]
    pub max_priority_fee_gwei: f64,
    #[serde(default = "default_gas_limit_buffer_percent")]
    pub gas_limit_buffer_percent: u64,

    // Submission & inclusion
    #[serde(default = "default_send_max_retries")]
    pub send_max_retries: usize,
    #[serde(default = "default_relay_timeout_ms")]
    pub relay_timeout_ms: u64,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_inclusion_timeout_secs")]
    pub inclusion_timeout_secs: u64,
    #[serde(default = "default_progress_log_secs")]
    pub progress_log_secs: u64,
}

// Defaults
fn default_false() -> bool {
    false
}
fn default_rpc_url() -> String {
    constants::DEFAULT_RPC_URL.to_string()
}
fn default_relay_url() -> String {
    constants::FLASHBOTS_RELAY_URL.to_string()
}
fn default_simulate_method() -> String {
    constants::SIMULATE_BUNDLE_METHOD.to_string()
}
fn default_send_method() -> String {
    constants::SEND_BUNDLE_METHOD.to_string()
}
fn default_token() -> Address {
    constants::DEFAULT_TOKEN
}
fn default_router() -> Address {
    constants::UNISWAP_V2_ROUTER
}
fn default_weth() -> Address {
    constants::WETH_MAINNET
}
fn default_eth_amount() -> String {
    constants::DEFAULT_ETH_AMOUNT.to_string()
}
fn default_slippage() -> f64 {
    constants::DEFAULT_SLIPPAGE
}
fn default_deadline_seconds() -> u64 {
    constants::DEFAULT_DEADLINE_SECONDS
}
fn default_liquidity_funding() -> String {
    LiquidityFunding::default().to_string()
}
fn default_priority_fee_multiplier_bps() -> u64 {
    constants::DEFAULT_PRIORITY_FEE_MULTIPLIER_BPS
}
fn default_base_fee_multiplier_bps() -> u64 {
    constants::DEFAULT_BASE_FEE_MULTIPLIER_BPS
}
fn default_min_priority_fee_gwei() -> f64 {
    constants::DEFAULT_MIN_PRIORITY_FEE_GWEI
}
fn default_max_priority_fee_gwei() -> f64 {
    constants::DEFAULT_MAX_PRIORITY_FEE_GWEI
}
fn default_gas_limit_buffer_percent() -> u64 {
    constants::DEFAULT_GAS_LIMIT_BUFFER_PERCENT
}
fn default_send_max_retries() -> usize {
    constants::DEFAULT_SEND_MAX_RETRIES
}
fn default_relay_timeout_ms() -> u64 {
    constants::DEFAULT_RELAY_TIMEOUT_MS
}
fn default_rpc_timeout_ms() -> u64 {
    constants::DEFAULT_RPC_TIMEOUT_MS
}
fn default_receipt_poll_ms() -> u64 {
    constants::DEFAULT_RECEIPT_POLL_MS
}
fn default_inclusion_timeout_secs() -> u64 {
    constants::DEFAULT_INCLUSION_TIMEOUT_SECS
}
fn default_progress_log_secs() -> u64 {
    constants::DEFAULT_PROGRESS_LOG_SECS
}

/// Values supplied on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub eoa_key: Option<String>,
    pub flashbots_key: Option<String>,
    pub token: Option<Address>,
    pub eth_amount: Option<String>,
    pub slippage: Option<f64>,
    pub deadline_seconds: Option<u64>,
}

fn first_non_empty<'a>(primary: &'a Option<String>, alias: &'a Option<String>) -> Option<&'a str> {
    let clean = |v: &'a Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty());
    clean(primary).or_else(|| clean(alias))
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = resolve_config_path(path) {
            builder = builder.add_source(File::from(Path::new(&selected_path)).required(true));
        }
        // Deterministic precedence: CLI (in main) > env/.env > selected profile file.
        builder = builder.add_source(Environment::default());

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    pub fn apply_overrides(&mut self, overrides: SettingsOverrides) {
        if let Some(key) = overrides.eoa_key {
            self.wallet_key = Some(key);
        }
        if let Some(key) = overrides.flashbots_key {
            self.bundle_signer_key = Some(key);
        }
        if let Some(token) = overrides.token {
            self.token_address = token;
        }
        if let Some(amount) = overrides.eth_amount {
            self.eth_amount = amount;
        }
        if let Some(slippage) = overrides.slippage {
            self.slippage = slippage;
        }
        if let Some(deadline) = overrides.deadline_seconds {
            self.deadline_seconds = deadline;
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.wallet_key()?;
        self.bundle_signer_key()?;
        Url::parse(&self.rpc_url)
            .map_err(|e| AppError::Config(format!("Invalid rpc_url: {}", e)))?;
        Url::parse(&self.relay_url)
            .map_err(|e| AppError::Config(format!("Invalid relay_url: {}", e)))?;
        if !(0.0..1.0).contains(&self.slippage) {
            return Err(AppError::Config(format!(
                "slippage must be in [0, 1), got {}",
                self.slippage
            )));
        }
        if self.min_priority_fee_gwei > self.max_priority_fee_gwei {
            return Err(AppError::Config(format!(
                "min_priority_fee_gwei ({}) exceeds max_priority_fee_gwei ({})",
                self.min_priority_fee_gwei, self.max_priority_fee_gwei
            )));
        }
        if self.send_max_retries == 0 {
            return Err(AppError::Config("send_max_retries must be at least 1".into()));
        }
        self.eth_amount_wei()?;
        self.liquidity_funding()?;
        Ok(())
    }

    pub fn wallet_key(&self) -> Result<&str, AppError> {
        first_non_empty(&self.wallet_key, &self.eoa_private_key)
            .ok_or_else(|| AppError::Config("WALLET_KEY (or EOA_PRIVATE_KEY) is missing".into()))
    }

    pub fn bundle_signer_key(&self) -> Result<&str, AppError> {
        first_non_empty(&self.bundle_signer_key, &self.flashbots_signer_key).ok_or_else(|| {
            AppError::Config("BUNDLE_SIGNER_KEY (or FLASHBOTS_SIGNER_KEY) is missing".into())
        })
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }

    pub fn eth_amount_wei(&self) -> Result<U256, AppError> {
        match parse_ether_amount(&self.eth_amount) {
            Some(v) if !v.is_zero() => Ok(v),
            Some(_) => Err(AppError::Config("eth_amount must be greater than zero".into())),
            None => Err(AppError::Config(format!(
                "eth_amount '{}' is not a valid ether amount",
                self.eth_amount
            ))),
        }
    }

    pub fn liquidity_funding(&self) -> Result<LiquidityFunding, AppError> {
        self.liquidity_funding.parse()
    }

    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy {
            min_priority_fee: gwei_to_wei(self.min_priority_fee_gwei),
            max_priority_fee: gwei_to_wei(self.max_priority_fee_gwei),
            priority_multiplier_bps: self.priority_fee_multiplier_bps,
            base_fee_multiplier_bps: self.base_fee_multiplier_bps,
        }
    }

    pub fn sequencer_config(&self) -> Result<SequencerConfig, AppError> {
        Ok(SequencerConfig {
            router: self.router_address,
            weth: self.weth_address,
            gas_limit_buffer_percent: self.gas_limit_buffer_percent,
            liquidity_funding: self.liquidity_funding()?,
            estimate_attempts: constants::GAS_ESTIMATE_ATTEMPTS,
            estimate_backoff_step: constants::GAS_ESTIMATE_BACKOFF_STEP,
        })
    }

    pub fn submission_policy(&self) -> SubmissionPolicy {
        SubmissionPolicy {
            max_retries: self.send_max_retries.max(1),
            backoff_step: constants::SEND_BACKOFF_STEP,
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms.max(1_000))
    }

    pub fn receipt_poll_ms_value(&self) -> u64 {
        self.receipt_poll_ms.max(100)
    }

    pub fn inclusion_policy(&self) -> InclusionPolicy {
        let poll_ms = self.receipt_poll_ms_value();
        InclusionPolicy {
            poll_interval: Duration::from_millis(poll_ms),
            timeout: Duration::from_secs(self.inclusion_timeout_secs)
                .max(Duration::from_millis(poll_ms)),
            progress_interval: Duration::from_secs(self.progress_log_secs.max(1)),
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            url: self.relay_url.clone(),
            timeout: Duration::from_millis(self.relay_timeout_ms.max(1_000)),
            simulate_method: self.simulate_method.clone(),
            send_method: self.send_method.clone(),
        }
    }

    pub fn pipeline_settings(&self, dry_run: bool) -> Result<PipelineSettings, AppError> {
        Ok(PipelineSettings {
            fee_policy: self.fee_policy(),
            sequencer: self.sequencer_config()?,
            submission: self.submission_policy(),
            inclusion: self.inclusion_policy(),
            token: self.token_address,
            budget: self.eth_amount_wei()?,
            slippage: self.slippage,
            deadline_seconds: self.deadline_seconds,
            dry_run,
        })
    }
}

fn resolve_config_path(path: Option<&str>) -> Option<String> {
    if let Some(path) = path {
        return Some(path.to_string());
    }
    detect_config_file()
}

fn detect_config_file() -> Option<String> {
    ["config.prod.toml", "config.dev.toml", "config.toml"]
        .iter()
        .find(|file| Path::new(file).exists())
        .map(|file| (*file).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use std::sync::{Mutex, OnceLock};

    fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn from_toml(body: &str) -> GlobalSettings {
        Config::builder()
            .add_source(File::from_str(body, FileFormat::Toml))
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize")
    }

    fn base_settings() -> GlobalSettings {
        from_toml(
            r#"
wallet_key = "0x01"
bundle_signer_key = "0x02"
"#,
        )
    }

    fn temp_config(tag: &str, body: &str) -> std::path::PathBuf {
        let tmp = std::env::temp_dir().join(format!(
            "bundler-{tag}-{}-{}.toml",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::write(&tmp, body).expect("write temp config");
        tmp
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = base_settings();
        assert_eq!(s.rpc_url, constants::DEFAULT_RPC_URL);
        assert_eq!(s.relay_url, constants::FLASHBOTS_RELAY_URL);
        assert_eq!(s.token_address, constants::DEFAULT_TOKEN);
        assert_eq!(s.router_address, constants::UNISWAP_V2_ROUTER);
        assert_eq!(s.eth_amount, "0.002");
        assert_eq!(s.deadline_seconds, 120);
        assert_eq!(s.send_max_retries, 3);
        assert_eq!(s.rpc_timeout(), Duration::from_secs(10));
        assert_eq!(s.liquidity_funding().expect("funding"), LiquidityFunding::EvenSplit);
        assert_eq!(s.simulate_method, "eth_callBundle");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn aliases_fill_missing_keys() {
        let s = from_toml(
            r#"
eoa_private_key = "0xaa"
flashbots_signer_key = "0xbb"
"#,
        );
        assert_eq!(s.wallet_key().expect("wallet"), "0xaa");
        assert_eq!(s.bundle_signer_key().expect("signer"), "0xbb");
    }

    #[test]
    fn blank_keys_are_rejected() {
        let s = from_toml(
            r#"
wallet_key = "  "
bundle_signer_key = "0x02"
"#,
        );
        let err = s.validate().expect_err("missing key");
        assert!(matches!(err, AppError::Config(msg) if msg.contains("WALLET_KEY")));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut s = base_settings();
        s.slippage = 1.0;
        assert!(s.validate().is_err());

        let mut s = base_settings();
        s.min_priority_fee_gwei = 60.0;
        assert!(s.validate().is_err());

        let mut s = base_settings();
        s.send_max_retries = 0;
        assert!(s.validate().is_err());

        let mut s = base_settings();
        s.eth_amount = "0".into();
        assert!(s.validate().is_err());

        let mut s = base_settings();
        s.eth_amount = "lots".into();
        assert!(s.validate().is_err());

        let mut s = base_settings();
        s.liquidity_funding = "half".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut s = base_settings();
        s.apply_overrides(SettingsOverrides {
            eoa_key: Some("0xcli".into()),
            eth_amount: Some("0.5".into()),
            slippage: Some(0.05),
            ..SettingsOverrides::default()
        });
        assert_eq!(s.wallet_key().expect("wallet"), "0xcli");
        assert_eq!(s.bundle_signer_key().expect("signer"), "0x02");
        assert_eq!(
            s.eth_amount_wei().expect("amount"),
            U256::from(500_000_000_000_000_000u64)
        );
        assert_eq!(s.slippage, 0.05);
    }

    #[test]
    fn policies_project_settings() {
        let mut s = base_settings();
        s.receipt_poll_ms = 10;
        s.inclusion_timeout_secs = 0;
        let inclusion = s.inclusion_policy();
        assert_eq!(inclusion.poll_interval, Duration::from_millis(100));
        assert_eq!(inclusion.timeout, Duration::from_millis(100));

        let fees = s.fee_policy();
        assert_eq!(fees.min_priority_fee, 2_000_000_000);
        assert_eq!(fees.max_priority_fee, 50_000_000_000);
        assert_eq!(fees.priority_multiplier_bps, 30_000);

        let pipeline = s.pipeline_settings(true).expect("pipeline");
        assert!(pipeline.dry_run);
        assert_eq!(pipeline.budget, U256::from(2_000_000_000_000_000u64));
        assert_eq!(pipeline.sequencer.gas_limit_buffer_percent, 30);
    }

    #[test]
    fn explicit_config_path_wins_over_discovery() {
        let resolved = resolve_config_path(Some("custom-config.toml"));
        assert_eq!(resolved.as_deref(), Some("custom-config.toml"));
    }

    #[test]
    fn env_overrides_selected_profile_file_values() {
        let _env_lock = env_lock_guard();
        let tmp = temp_config(
            "env-override",
            r#"
wallet_key = "file_wallet_key"
bundle_signer_key = "file_signer_key"
slippage = 0.02
"#,
        );
        let old_wallet_key = std::env::var("WALLET_KEY").ok();
        unsafe {
            std::env::set_var("WALLET_KEY", "env_wallet_key");
        }

        let loaded = GlobalSettings::load_with_path(Some(tmp.to_str().expect("utf8 path")))
            .expect("load settings");
        assert_eq!(loaded.wallet_key().expect("wallet"), "env_wallet_key");
        assert_eq!(loaded.slippage, 0.02);

        std::fs::remove_file(&tmp).ok();
        if let Some(v) = old_wallet_key {
            unsafe { std::env::set_var("WALLET_KEY", v) };
        } else {
            unsafe { std::env::remove_var("WALLET_KEY") };
        }
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let _env_lock = env_lock_guard();
        let err = GlobalSettings::load_with_path(Some("/nonexistent/bundler-config.toml"))
            .expect_err("file is required");
        assert!(matches!(err, AppError::Config(_)));
    }
}
