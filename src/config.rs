//! Configuration loading
//!
//! The reconciler reads a single TOML file holding the remote authority
//! connection, logging preferences, and one table per currency with its
//! wallet connection and payout policy.
//!
//! ```toml
//! [remote]
//! url = "https://pool.example.com/"
//! signature_secret = "shared secret"
//!
//! [[currencies]]
//! currency_code = "LTC"
//! valid_address_versions = [48, 50]
//! minimum_tx_output = "0.001"
//!
//! [currencies.wallet]
//! url = "http://127.0.0.1:9332"
//! username = "rpcuser"
//! password = "rpcpass"
//! ```

use crate::core::batch::BatchPolicy;
use crate::types::PayoutError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Full reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote authority connection
    pub remote: RemoteConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// One entry per currency paid out by this process
    pub currencies: Vec<CurrencyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL; endpoints are resolved under `<url>/rpc/`
    pub url: String,
    /// Shared secret used to sign and verify envelopes
    pub signature_secret: String,
    /// Oldest acceptable response age in seconds
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Request timeout in seconds
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    pub currency_code: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base58check version bytes accepted for destination addresses
    pub valid_address_versions: Vec<u8>,
    /// Directory holding one ledger store per currency
    #[serde(default = "default_database_dir")]
    pub database_dir: PathBuf,
    /// Confirmations a transaction must exceed to be reported confirmed
    #[serde(default = "default_min_confirms")]
    pub min_confirms: u64,
    /// Smallest output the network will relay
    #[serde(default = "default_minimum_tx_output")]
    pub minimum_tx_output: Decimal,
    /// Maximum outputs in one wallet transaction
    #[serde(default = "default_max_outputs")]
    pub max_outputs: usize,
    /// Fractional digits of the currency's smallest unit
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
    pub wallet: WalletConfig,
}

impl CurrencyConfig {
    /// Location of this currency's ledger store
    pub fn store_path(&self) -> PathBuf {
        self.database_dir.join(format!("rpc_{}", self.currency_code))
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            minimum_output: self.minimum_tx_output,
            max_outputs: self.max_outputs,
            decimal_places: self.decimal_places,
        }
    }

    fn validate(&self) -> Result<(), PayoutError> {
        let code = &self.currency_code;
        if code.trim().is_empty() {
            return Err(PayoutError::config("currency_code must not be empty"));
        }
        if self.valid_address_versions.is_empty() {
            return Err(PayoutError::config(format!(
                "{code}: valid_address_versions must list at least one version"
            )));
        }
        if self.max_outputs == 0 {
            return Err(PayoutError::config(format!("{code}: max_outputs must be > 0")));
        }
        if self.decimal_places > 28 {
            return Err(PayoutError::config(format!(
                "{code}: decimal_places must be <= 28"
            )));
        }
        if self.minimum_tx_output.is_sign_negative() {
            return Err(PayoutError::config(format!(
                "{code}: minimum_tx_output must not be negative"
            )));
        }
        if self.wallet.url.trim().is_empty() {
            return Err(PayoutError::config(format!("{code}: wallet.url is required")));
        }
        if self.wallet.timeout_secs == 0 {
            return Err(PayoutError::config(format!(
                "{code}: wallet.timeout_secs must be > 0"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the wallet daemon
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Wallet account funds are paid from
    #[serde(default)]
    pub account: String,
    #[serde(default = "default_wallet_timeout_secs")]
    pub timeout_secs: u64,
    /// RPC method used as the liveness probe
    #[serde(default = "default_probe_method")]
    pub probe_method: String,
}

impl WalletConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, PayoutError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PayoutError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self, PayoutError> {
        let config: Config =
            toml::from_str(contents).map_err(|e| PayoutError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PayoutError> {
        if self.remote.url.trim().is_empty() {
            return Err(PayoutError::config("remote.url is required"));
        }
        if self.remote.signature_secret.is_empty() {
            return Err(PayoutError::config("remote.signature_secret is required"));
        }
        if self.remote.max_age_secs == 0 {
            return Err(PayoutError::config("remote.max_age_secs must be > 0"));
        }
        if self.remote.timeout_secs == 0 {
            return Err(PayoutError::config("remote.timeout_secs must be > 0"));
        }
        if self.currencies.is_empty() {
            return Err(PayoutError::config("at least one [[currencies]] entry is required"));
        }

        let mut seen = HashSet::new();
        for currency in &self.currencies {
            currency.validate()?;
            if !seen.insert(currency.currency_code.as_str()) {
                return Err(PayoutError::config(format!(
                    "currency {} is configured twice",
                    currency.currency_code
                )));
            }
        }
        Ok(())
    }

    /// Currencies a command should run for: the named one (enabled or not),
    /// or every enabled currency.
    pub fn select_currencies(&self, code: Option<&str>) -> Result<Vec<&CurrencyConfig>, PayoutError> {
        match code {
            Some(code) => self
                .currencies
                .iter()
                .find(|c| c.currency_code.eq_ignore_ascii_case(code))
                .map(|c| vec![c])
                .ok_or_else(|| PayoutError::config(format!("currency {code} is not configured"))),
            None => Ok(self.currencies.iter().filter(|c| c.enabled).collect()),
        }
    }
}

// Default value functions
fn default_max_age_secs() -> u64 {
    10
}
fn default_remote_timeout_secs() -> u64 {
    270
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> LogFormat {
    LogFormat::Text
}
fn default_true() -> bool {
    true
}
fn default_database_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_min_confirms() -> u64 {
    12
}
fn default_minimum_tx_output() -> Decimal {
    Decimal::new(1, 8)
}
fn default_max_outputs() -> usize {
    10000
}
fn default_decimal_places() -> u32 {
    8
}
fn default_wallet_timeout_secs() -> u64 {
    30
}
fn default_probe_method() -> String {
    "getinfo".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MINIMAL: &str = r#"
        [remote]
        url = "https://pool.example.com/"
        signature_secret = "secret"

        [[currencies]]
        currency_code = "LTC"
        valid_address_versions = [48, 50]

        [currencies.wallet]
        url = "http://127.0.0.1:9332"
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.remote.max_age_secs, 10);
        assert_eq!(config.remote.timeout_secs, 270);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);

        let ltc = &config.currencies[0];
        assert!(ltc.enabled);
        assert_eq!(ltc.min_confirms, 12);
        assert_eq!(ltc.minimum_tx_output, Decimal::new(1, 8));
        assert_eq!(ltc.max_outputs, 10000);
        assert_eq!(ltc.decimal_places, 8);
        assert_eq!(ltc.wallet.probe_method, "getinfo");
        assert_eq!(ltc.wallet.account, "");
        assert_eq!(ltc.store_path(), PathBuf::from("./data").join("rpc_LTC"));
    }

    #[test]
    fn test_minimum_output_parsed_exactly_from_string() {
        let text = MINIMAL.replace(
            "valid_address_versions = [48, 50]",
            "valid_address_versions = [48, 50]\nminimum_tx_output = \"0.001\"",
        );
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(config.currencies[0].minimum_tx_output, Decimal::new(1, 3));
        assert_eq!(config.currencies[0].batch_policy().minimum_output, Decimal::new(1, 3));
    }

    #[rstest]
    #[case::empty_secret("signature_secret = \"secret\"", "signature_secret = \"\"")]
    #[case::no_versions("valid_address_versions = [48, 50]", "valid_address_versions = []")]
    #[case::zero_max_age("signature_secret = \"secret\"", "signature_secret = \"secret\"\nmax_age_secs = 0")]
    #[case::no_wallet_url("url = \"http://127.0.0.1:9332\"", "url = \"\"")]
    fn test_invalid_config_rejected(#[case] from: &str, #[case] to: &str) {
        let text = MINIMAL.replace(from, to);
        let result = Config::from_toml_str(&text);
        assert!(matches!(result, Err(PayoutError::Config { .. })));
    }

    #[test]
    fn test_missing_wallet_table_rejected() {
        let text = MINIMAL.replace("[currencies.wallet]\n        url = \"http://127.0.0.1:9332\"", "");
        assert!(Config::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_select_currencies() {
        let text = format!(
            "{MINIMAL}\n[[currencies]]\ncurrency_code = \"BTC\"\nenabled = false\nvalid_address_versions = [0, 5]\n[currencies.wallet]\nurl = \"http://127.0.0.1:8332\"\n"
        );
        let config = Config::from_toml_str(&text).unwrap();

        let enabled = config.select_currencies(None).unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].currency_code, "LTC");

        let btc = config.select_currencies(Some("btc")).unwrap();
        assert_eq!(btc[0].currency_code, "BTC");

        assert!(config.select_currencies(Some("DOGE")).is_err());
    }

    #[test]
    fn test_duplicate_currency_rejected() {
        let text = format!(
            "{MINIMAL}\n[[currencies]]\ncurrency_code = \"LTC\"\nvalid_address_versions = [48]\n[currencies.wallet]\nurl = \"http://x\"\n"
        );
        assert!(Config::from_toml_str(&text).is_err());
    }
}
