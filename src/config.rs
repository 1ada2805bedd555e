//! Application configuration
//!
//! Loaded from a YAML file (see `config/default.yaml`). Every section has
//! defaults, so a partial file, or no file at all, is valid.

use crate::types::LedgerError;
use chrono::{FixedOffset, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub accrual: AccrualConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Transfer ledger limits, fees and calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub daily_limit: Decimal,
    pub monthly_limit: Decimal,

    /// Flat processing fee charged on withdrawals
    pub withdrawal_fee: Decimal,

    /// Offset of the ledger's time zone; limit windows and pool dates follow it
    pub utc_offset_minutes: i32,

    pub history_default_page_size: usize,
    pub history_max_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            daily_limit: Decimal::new(10_000, 0),
            monthly_limit: Decimal::new(50_000, 0),
            withdrawal_fee: Decimal::new(25, 2),
            utc_offset_minutes: 0,
            history_default_page_size: 50,
            history_max_page_size: 200,
        }
    }
}

impl LedgerConfig {
    /// The configured time zone as a fixed offset
    pub fn offset(&self) -> Result<FixedOffset, LedgerError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            LedgerError::config(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.daily_limit <= Decimal::ZERO || self.monthly_limit <= Decimal::ZERO {
            return Err(LedgerError::config("transfer limits must be positive"));
        }
        if self.daily_limit > self.monthly_limit {
            return Err(LedgerError::config(
                "daily_limit must not exceed monthly_limit",
            ));
        }
        if self.withdrawal_fee < Decimal::ZERO {
            return Err(LedgerError::config("withdrawal_fee must not be negative"));
        }
        if self.history_default_page_size == 0
            || self.history_default_page_size > self.history_max_page_size
        {
            return Err(LedgerError::config(
                "history page sizes must satisfy 0 < default <= max",
            ));
        }
        self.offset()?;
        Ok(())
    }
}

/// Float and interest accrual parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccrualConfig {
    /// Annual rate the platform earns on pooled balances
    pub float_rate: Decimal,

    /// Annual rate paid to users
    pub user_rate: Decimal,

    /// Accounts below this balance earn nothing
    pub minimum_for_interest: Decimal,

    pub days_in_year: u32,

    /// Decimal places kept on accrued amounts (banker's rounding)
    pub amount_scale: u32,

    /// Local time of day the scheduler runs the job
    pub run_at: NaiveTime,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            float_rate: Decimal::new(5, 2),
            user_rate: Decimal::new(4, 2),
            minimum_for_interest: Decimal::new(100, 2),
            days_in_year: 365,
            amount_scale: 4,
            run_at: NaiveTime::from_hms_opt(0, 5, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl AppConfig {
    /// Read and validate a YAML configuration file
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = fs::read_to_string(path).map_err(|e| {
            LedgerError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, LedgerError> {
        let config: AppConfig = serde_yaml::from_str(content)
            .map_err(|e| LedgerError::config(format!("Failed to parse config yaml: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        self.ledger.validate()?;
        self.accrual.validate()
    }
}

impl AccrualConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.user_rate < Decimal::ZERO || self.float_rate < Decimal::ZERO {
            return Err(LedgerError::config("rates must not be negative"));
        }
        if self.user_rate > self.float_rate {
            return Err(LedgerError::config("user_rate must not exceed float_rate"));
        }
        if self.days_in_year == 0 {
            return Err(LedgerError::config("days_in_year must be positive"));
        }
        if self.minimum_for_interest < Decimal::ZERO {
            return Err(LedgerError::config(
                "minimum_for_interest must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();

        assert_eq!(config.ledger.daily_limit, Decimal::new(10_000, 0));
        assert_eq!(config.ledger.monthly_limit, Decimal::new(50_000, 0));
        assert_eq!(config.ledger.withdrawal_fee, Decimal::new(25, 2));
        assert_eq!(config.accrual.days_in_year, 365);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_yaml_overrides_fields() {
        let yaml = r#"
ledger:
  daily_limit: "500"
  utc_offset_minutes: -300
accrual:
  float_rate: "0.06"
  run_at: "01:30:00"
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.ledger.daily_limit, Decimal::new(500, 0));
        assert_eq!(config.ledger.monthly_limit, Decimal::new(50_000, 0));
        assert_eq!(config.ledger.offset().unwrap().local_minus_utc(), -300 * 60);
        assert_eq!(config.accrual.float_rate, Decimal::new(6, 2));
        assert_eq!(
            config.accrual.run_at,
            NaiveTime::from_hms_opt(1, 30, 0).unwrap()
        );
    }

    #[rstest]
    #[case::zero_limit("ledger:\n  daily_limit: \"0\"\n")]
    #[case::daily_above_monthly("ledger:\n  daily_limit: \"60000\"\n")]
    #[case::negative_fee("ledger:\n  withdrawal_fee: \"-1\"\n")]
    #[case::offset_out_of_range("ledger:\n  utc_offset_minutes: 1500\n")]
    #[case::user_rate_above_float("accrual:\n  user_rate: \"0.09\"\n")]
    #[case::zero_days("accrual:\n  days_in_year: 0\n")]
    #[case::malformed("ledger: [not, a, map]\n")]
    fn test_invalid_config_rejected(#[case] yaml: &str) {
        let result = AppConfig::from_yaml(yaml);
        assert!(matches!(result, Err(LedgerError::Config { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load(Path::new("does/not/exist.yaml"));
        assert!(matches!(result, Err(LedgerError::Config { .. })));
    }
}
