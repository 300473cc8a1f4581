use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::rate_limit::RateLimitConfig;
use crate::slots::BusinessHours;

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: SocketAddr,

    /// Directory holding the persisted appointment blob
    pub data_dir: PathBuf,

    /// Consultation business hours
    pub business_hours: BusinessHours,

    /// Rate limit categories and quotas
    pub rate_limits: RateLimitConfig,

    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults suitable for local development.
    pub fn from_env() -> Result<Self> {
        let bind_addr = parse_env("BIND_ADDR", "127.0.0.1:3000")?;
        let data_dir = PathBuf::from(env_or("DATA_DIR", "./data"));

        let business_hours = BusinessHours {
            start_hour: parse_env("BUSINESS_HOURS_START", "9")?,
            end_hour: parse_env("BUSINESS_HOURS_END", "17")?,
        };
        business_hours.validate()?;

        let log_level = env_or("LOG_LEVEL", "info");

        Ok(Self {
            bind_addr,
            data_dir,
            business_hours,
            rate_limits: RateLimitConfig::default(),
            log_level,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| Error::Config(format!("invalid {}: {}", key, e)))
}
