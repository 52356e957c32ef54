use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

use crate::money::MAX_STORED_BALANCE;
use crate::transfer::fee::TRANSFER_FEE_POLICY_KEY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// PostgreSQL connection URL; the in-memory ledger is used when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "money_transfer.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            ledger: LedgerConfig::default(),
            postgres_url: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Largest balance any account may reach after a credit
    #[serde(default = "default_max_balance")]
    pub max_balance: Decimal,
    /// Name of the fee policy row loaded at startup
    #[serde(default = "default_fee_policy_key")]
    pub fee_policy_key: String,
}

fn default_max_balance() -> Decimal {
    MAX_STORED_BALANCE
}

fn default_fee_policy_key() -> String {
    TRANSFER_FEE_POLICY_KEY.to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_balance: default_max_balance(),
            fee_policy_key: default_fee_policy_key(),
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: config_path,
                source,
            },
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.max_balance <= Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "ledger.max_balance must be positive, got {}",
                self.ledger.max_balance
            )));
        }
        if self.ledger.max_balance > MAX_STORED_BALANCE {
            return Err(ConfigError::Invalid(format!(
                "ledger.max_balance {} exceeds storage maximum {}",
                self.ledger.max_balance, MAX_STORED_BALANCE
            )));
        }
        if self.ledger.fee_policy_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ledger.fee_policy_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const BASE: &str = r#"
log_level: debug
log_dir: ./logs
log_file: transfer.log
use_json: true
rotation: hourly
"#;

    #[test]
    fn test_ledger_section_defaults() {
        let config = AppConfig::from_yaml(BASE).unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(config.use_json);
        assert_eq!(config.ledger.max_balance, MAX_STORED_BALANCE);
        assert_eq!(config.ledger.fee_policy_key, "TRANSFER_FEE");
        assert!(config.postgres_url.is_none());
    }

    #[test]
    fn test_ledger_section_overrides() {
        let yaml = format!(
            "{}ledger:\n  max_balance: 1000000\n  fee_policy_key: WIRE_FEE\npostgres_url: postgres://localhost/ledger\n",
            BASE
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.ledger.max_balance, dec!(1000000));
        assert_eq!(config.ledger.fee_policy_key, "WIRE_FEE");
        assert_eq!(
            config.postgres_url.as_deref(),
            Some("postgres://localhost/ledger")
        );
    }

    #[test]
    fn test_rejects_ceiling_above_storage() {
        let yaml = format!("{}ledger:\n  max_balance: 99999999999999999\n", BASE);
        assert!(matches!(
            AppConfig::from_yaml(&yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(matches!(
            AppConfig::from_yaml("log_level: [unclosed"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AppConfig::load("does-not-exist"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_dev_config_loads() {
        let config = AppConfig::load("dev").unwrap();
        assert_eq!(config.ledger.max_balance, MAX_STORED_BALANCE);
    }

    #[test]
    fn test_default_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }
}
