use crate::domain::Percent;
use crate::engine::LedgerPolicy;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Daily mora rate applied to the original principal past the due date.
    pub daily_penalty_rate_percent: Percent,
    pub at_risk_window_days: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let daily_penalty_rate_percent = env_map
            .get("DAILY_PENALTY_RATE_PERCENT")
            .map(|s| s.as_str())
            .unwrap_or("0")
            .parse::<Percent>()
            .map_err(|e| {
                ConfigError::InvalidValue("DAILY_PENALTY_RATE_PERCENT".to_string(), e.to_string())
            })?;
        if daily_penalty_rate_percent.is_negative() {
            return Err(ConfigError::InvalidValue(
                "DAILY_PENALTY_RATE_PERCENT".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let at_risk_window_days = env_map
            .get("AT_RISK_WINDOW_DAYS")
            .map(|s| s.as_str())
            .unwrap_or("3")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "AT_RISK_WINDOW_DAYS".to_string(),
                    "must be a non-negative integer".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            daily_penalty_rate_percent,
            at_risk_window_days,
        })
    }

    /// Ledger rules derived from this configuration.
    pub fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            daily_penalty_rate_percent: self.daily_penalty_rate_percent,
            at_risk_window_days: self.at_risk_window_days,
        }
    }
}
