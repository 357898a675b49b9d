use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub timeline_limit: u32,
    pub secure_cookies: bool,
}

impl Config {
    /// Read configuration from `WARBLER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            db_path: lookup("WARBLER_DB_PATH")
                .unwrap_or_else(|| "warbler.db".into())
                .into(),
            host: lookup("WARBLER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&lookup, "WARBLER_PORT", 3000)?,
            request_timeout: Duration::from_secs(parse(&lookup, "WARBLER_REQUEST_TIMEOUT_SECS", 30)?),
            timeline_limit: parse(&lookup, "WARBLER_TIMELINE_LIMIT", 100)?,
            secure_cookies: parse(&lookup, "WARBLER_SECURE_COOKIES", false)?,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("Invalid {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
