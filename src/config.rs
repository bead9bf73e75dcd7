use crate::domain::Decimal;
use std::collections::HashMap;
use thiserror::Error;

/// Default stooq endpoint for daily bars.
pub const DEFAULT_MARKET_DATA_URL: &str = "https://stooq.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    /// Initial cash balance seeded into a fresh ledger; also the baseline
    /// for the overall-return column.
    pub starting_cash: Decimal,
    pub market_data_url: String,
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

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let starting_cash = env_map
            .get("STARTING_CASH")
            .map(|s| s.as_str())
            .unwrap_or("10000")
            .parse::<Decimal>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "STARTING_CASH".to_string(),
                    "must be a valid decimal amount".to_string(),
                )
            })?;
        if !starting_cash.is_positive() {
            return Err(ConfigError::InvalidValue(
                "STARTING_CASH".to_string(),
                "must be positive".to_string(),
            ));
        }

        let market_data_url = env_map
            .get("MARKET_DATA_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_MARKET_DATA_URL.to_string());

        Ok(Config {
            database_path,
            starting_cash,
            market_data_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/ledger.db".to_string());
        map
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.starting_cash, Decimal::from_str("10000").unwrap());
        assert_eq!(config.market_data_url, DEFAULT_MARKET_DATA_URL);
    }

    #[test]
    fn test_missing_database_path() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_starting_cash() {
        let mut env_map = setup_required_env();
        env_map.insert("STARTING_CASH".to_string(), "lots".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "STARTING_CASH"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_nonpositive_starting_cash_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("STARTING_CASH".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_env_map(env_map),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }

    #[test]
    fn test_custom_starting_cash() {
        let mut env_map = setup_required_env();
        env_map.insert("STARTING_CASH".to_string(), "25000.50".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.starting_cash, Decimal::from_str("25000.50").unwrap());
    }
}
