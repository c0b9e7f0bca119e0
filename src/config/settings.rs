//! Application settings loading from config.toml
//!
//! Money rules that operators tune without a deploy (fees, minimum withdrawal,
//! ledger currency) and the payout gateway endpoint are read from a TOML file.
//! Secrets stay in the environment: the file only names the variable holding
//! the gateway API key.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Currency every wallet balance is denominated in
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Percentage fee retained on user-to-user transfers
    #[serde(default)]
    pub transfer_fee_percent: Decimal,
    /// Withdrawal rules
    #[serde(default)]
    pub withdrawal: WithdrawalSettings,
    /// Payout gateway endpoint
    #[serde(default)]
    pub gateway: GatewaySettings,
}

/// Withdrawal rules
#[derive(Debug, Deserialize, Clone)]
pub struct WithdrawalSettings {
    /// Percentage fee retained on every withdrawal
    #[serde(default)]
    pub fee_percent: Decimal,
    /// Smallest amount a user may request
    #[serde(default)]
    pub min_amount: Decimal,
    /// Currency every wallet balance is denominated in (copied from the top level)
    #[serde(skip, default = "default_base_currency")]
    pub base_currency: String,
}

/// Payout gateway endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct GatewaySettings {
    /// Base URL of the mobile-money payout API
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Upper bound on a single payout call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_currency() -> String {
    "XOF".to_string()
}

fn default_gateway_url() -> String {
    "http://localhost:8089".to_string()
}

fn default_api_key_env() -> String {
    "PAYOUT_API_KEY".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for WithdrawalSettings {
    fn default() -> Self {
        Self {
            fee_percent: Decimal::ZERO,
            min_amount: Decimal::ZERO,
            base_currency: default_base_currency(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            transfer_fee_percent: Decimal::ZERO,
            withdrawal: WithdrawalSettings::default(),
            gateway: GatewaySettings::default(),
        }
    }
}

impl AppConfig {
    fn validate(mut self) -> Result<Self> {
        let hundred = Decimal::ONE_HUNDRED;
        for (name, value) in [
            ("transfer_fee_percent", self.transfer_fee_percent),
            ("withdrawal.fee_percent", self.withdrawal.fee_percent),
        ] {
            if value < Decimal::ZERO || value >= hundred {
                return Err(Error::Config {
                    message: format!("{name} must be in [0, 100), got {value}"),
                });
            }
        }
        if self.withdrawal.min_amount < Decimal::ZERO {
            return Err(Error::Config {
                message: "withdrawal.min_amount cannot be negative".to_string(),
            });
        }
        if self.gateway.timeout_secs == 0 {
            return Err(Error::Config {
                message: "gateway.timeout_secs must be positive".to_string(),
            });
        }
        self.base_currency = self.base_currency.trim().to_uppercase();
        self.withdrawal.base_currency.clone_from(&self.base_currency);
        Ok(self)
    }
}

/// Parses settings from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A fee is outside `[0, 100)` or the timeout is zero
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Loads settings from the default location (./config.toml)
pub fn load_default_config() -> Result<AppConfig> {
    load_config("config.toml")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            base_currency = "xof"
            transfer_fee_percent = "1.5"

            [withdrawal]
            fee_percent = "2"
            min_amount = "500"

            [gateway]
            base_url = "https://payouts.example.com"
            api_key_env = "MOMO_KEY"
            timeout_secs = 10
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.base_currency, "XOF");
        assert_eq!(config.withdrawal.base_currency, "XOF");
        assert_eq!(config.transfer_fee_percent, Decimal::new(15, 1));
        assert_eq!(config.withdrawal.fee_percent, Decimal::from(2));
        assert_eq!(config.withdrawal.min_amount, Decimal::from(500));
        assert_eq!(config.gateway.base_url, "https://payouts.example.com");
        assert_eq!(config.gateway.api_key_env, "MOMO_KEY");
        assert_eq!(config.gateway.timeout_secs, 10);
    }

    #[test]
    fn test_missing_tables_use_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.base_currency, "XOF");
        assert_eq!(config.withdrawal.fee_percent, Decimal::ZERO);
        assert_eq!(config.gateway.timeout_secs, 30);
        assert_eq!(config.gateway.api_key_env, "PAYOUT_API_KEY");
    }

    #[test]
    fn test_fee_out_of_range_is_rejected() {
        let result = parse_config("[withdrawal]\nfee_percent = \"120\"\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = parse_config("[gateway]\ntimeout_secs = 0\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
