//! Configuration management for the transaction submitter
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::tx::TxRequest;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "SUBMITTER_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub rpc: RpcConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub transactions: Vec<TransactionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Fetched from the node when absent
    pub chain_id: Option<u64>,
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GasConfig {
    #[serde(default)]
    pub strategy: GasPriceStrategy,
    #[serde(default = "default_limit_buffer_percent")]
    pub limit_buffer_percent: u64,
    #[serde(default = "default_price_buffer_percent")]
    pub price_buffer_percent: u64,
    /// Fixed gas limit; skips `eth_estimateGas` when set
    pub limit: Option<u64>,
    #[serde(default = "default_max_gas_price_gwei")]
    pub max_gas_price_gwei: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            strategy: GasPriceStrategy::default(),
            limit_buffer_percent: default_limit_buffer_percent(),
            price_buffer_percent: default_price_buffer_percent(),
            limit: None,
            max_gas_price_gwei: default_max_gas_price_gwei(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GasPriceStrategy {
    #[default]
    Legacy,
    Eip1559,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default)]
    pub mode: ConfirmationMode,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            mode: ConfirmationMode::default(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationMode {
    /// Single lookup after `initial_delay_ms`
    Fixed,
    #[default]
    Backoff,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// A pre-encoded contract call
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    pub name: String,
    pub to: String,
    /// Wei, decimal
    #[serde(default = "default_value")]
    pub value: String,
    /// ABI-encoded calldata, hex
    pub data: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_private_key_env() -> String {
    "SUBMITTER_PRIVATE_KEY".to_string()
}

fn default_limit_buffer_percent() -> u64 {
    20
}

fn default_price_buffer_percent() -> u64 {
    10
}

fn default_max_gas_price_gwei() -> u64 {
    500
}

fn default_initial_delay_ms() -> u64 {
    5_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> u32 {
    2
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_value() -> String {
    "0".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Settings {
    /// Load settings from the file named by `SUBMITTER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.rpc.url.trim().is_empty() {
            anyhow::bail!("rpc.url must not be empty");
        }
        if self.rpc.request_timeout_ms == 0 {
            anyhow::bail!("rpc.request_timeout_ms must be positive");
        }

        let confirmation = &self.confirmation;
        if confirmation.multiplier == 0 {
            anyhow::bail!("confirmation.multiplier must be at least 1");
        }
        if confirmation.max_delay_ms < confirmation.initial_delay_ms {
            anyhow::bail!(
                "confirmation.max_delay_ms ({}) is below initial_delay_ms ({})",
                confirmation.max_delay_ms,
                confirmation.initial_delay_ms
            );
        }
        if confirmation.timeout_secs == 0 {
            anyhow::bail!("confirmation.timeout_secs must be positive");
        }

        if self.enabled_transactions().is_empty() {
            anyhow::bail!("At least one transaction must be enabled");
        }

        for tx in &self.transactions {
            if !tx.enabled {
                tracing::debug!("Transaction {} is disabled - will skip", tx.name);
                continue;
            }
            TxRequest::try_from(tx)
                .with_context(|| format!("Invalid transaction {}", tx.name))?;
        }

        Ok(())
    }

    /// Get list of enabled transactions, in submission order
    pub fn enabled_transactions(&self) -> Vec<&TransactionConfig> {
        self.transactions.iter().filter(|t| t.enabled).collect()
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DEPOSIT_DATA: &str = "0x58bd9b810000000000000000000000000000000000000000000000000000000000000065";

    fn minimal_config(extra: &str) -> String {
        format!(
            r#"
[rpc]
url = "http://127.0.0.1:8545"

{extra}

[[transactions]]
name = "deposit"
to = "0x0000000000000000000000000000000000000804"
data = "{DEPOSIT_DATA}"
"#
        )
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("SUBMITTER_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${SUBMITTER_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_missing_env_var_becomes_empty() {
        let result = substitute_env_vars("key = \"${SUBMITTER_SURELY_UNSET_VAR}\"");
        assert_eq!(result, "key = \"\"");
    }

    #[test]
    fn test_defaults_applied() {
        let settings = Settings::from_toml_str(&minimal_config("")).unwrap();

        assert_eq!(settings.rpc.request_timeout_ms, 10_000);
        assert_eq!(settings.rpc.chain_id, None);
        assert_eq!(settings.wallet.private_key_env, "SUBMITTER_PRIVATE_KEY");
        assert_eq!(settings.gas.strategy, GasPriceStrategy::Legacy);
        assert_eq!(settings.confirmation.mode, ConfirmationMode::Backoff);
        assert_eq!(settings.confirmation.initial_delay_ms, 5_000);
        assert_eq!(settings.logging.format, LogFormat::Pretty);

        let tx = &settings.transactions[0];
        assert_eq!(tx.value, "0");
        assert!(tx.enabled);
    }

    #[test]
    fn test_disabled_transactions_skipped() {
        let config = minimal_config(
            r#"
[[transactions]]
name = "delegate"
to = "not-an-address"
data = "zz"
enabled = false
"#,
        );
        let settings = Settings::from_toml_str(&config).unwrap();

        assert_eq!(settings.transactions.len(), 2);
        let enabled = settings.enabled_transactions();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "deposit");
    }

    #[test]
    fn test_rejects_bad_payload() {
        let config = r#"
[rpc]
url = "http://127.0.0.1:8545"

[[transactions]]
name = "withdraw"
to = "0x0000000000000000000000000000000000000808"
data = "0xnothex"
"#;
        let err = Settings::from_toml_str(config).unwrap_err();
        assert!(format!("{:#}", err).contains("withdraw"));
    }

    #[test]
    fn test_rejects_no_enabled_transactions() {
        let config = r#"
[rpc]
url = "http://127.0.0.1:8545"
"#;
        assert!(Settings::from_toml_str(config).is_err());
    }

    #[test]
    fn test_rejects_inverted_backoff_bounds() {
        let config = minimal_config(
            r#"
[confirmation]
initial_delay_ms = 10000
max_delay_ms = 1000
"#,
        );
        assert!(Settings::from_toml_str(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            minimal_config(
                r#"
[confirmation]
mode = "fixed"

[gas]
strategy = "eip1559"
limit = 250000
"#
            )
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.confirmation.mode, ConfirmationMode::Fixed);
        assert_eq!(settings.gas.strategy, GasPriceStrategy::Eip1559);
        assert_eq!(settings.gas.limit, Some(250_000));
    }

    #[test]
    fn test_shipped_default_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let settings = Settings::load_from(&path).unwrap();

        let names: Vec<_> = settings
            .enabled_transactions()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["deposit", "withdraw"]);
    }
}
