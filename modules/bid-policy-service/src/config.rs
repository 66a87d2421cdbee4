use std::env;
use std::time::Duration;

use thiserror::Error;

pub const MODE_DEVELOPMENT: &str = "development";
pub const MODE_PRODUCTION: &str = "production";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown mode: '{0}'")]
    UnknownMode(String),
    #[error("{key} must be a valid number, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: String,
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub db_pool_size: u32,
    pub cache_capacity: u64,
    pub op_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = lookup("MODE").unwrap_or_else(|| MODE_PRODUCTION.to_string());
        if mode != MODE_DEVELOPMENT && mode != MODE_PRODUCTION {
            return Err(ConfigError::UnknownMode(mode));
        }

        let op_timeout_ms: u64 = parse_or(&lookup, "BID_POLICY_OP_TIMEOUT_MS", 3000)?;

        Ok(Self {
            mode,
            host: lookup("BID_POLICY_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "BID_POLICY_PORT", 9110)?,
            db_path: lookup("BID_POLICY_DB_PATH").unwrap_or_else(|| "./bid_policies.db".to_string()),
            db_pool_size: parse_or(&lookup, "BID_POLICY_DB_POOL_SIZE", 8)?,
            cache_capacity: parse_or(&lookup, "BID_POLICY_CACHE_CAPACITY", 10_000)?,
            op_timeout: Duration::from_millis(op_timeout_ms),
        })
    }

    pub fn is_development(&self) -> bool {
        self.mode == MODE_DEVELOPMENT
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}
