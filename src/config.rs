use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REPORT_RATE_LIMIT: u32 = 5;
const DEFAULT_REPORT_RATE_WINDOW_SECS: u64 = 60;

/// Process-level settings read from the environment (and `.env`).
///
/// Settings that can change at runtime, like the LLM provider, live in the
/// `app_config` table instead.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// `None` means the default `~/.adpulse/adpulse.db`.
    pub db_path: Option<PathBuf>,
    /// Origin of the dashboard that serves the Shopify analytics endpoints.
    pub base_url: String,
    pub openai_api_key: Option<String>,
    pub upstream_timeout: Duration,
    pub report_rate_limit: u32,
    pub report_rate_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8080))),
            db_path: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            openai_api_key: None,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            report_rate_limit: DEFAULT_REPORT_RATE_LIMIT,
            report_rate_window: Duration::from_secs(DEFAULT_REPORT_RATE_WINDOW_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = match var("ADPULSE_LISTEN_ADDR") {
            Some(addr) => addr
                .parse()
                .map_err(|e| Error::Config(format!("invalid ADPULSE_LISTEN_ADDR {addr}: {e}")))?,
            None => defaults.listen_addr,
        };

        let base_url = var("ADPULSE_BASE_URL")
            .or_else(|| var("NEXT_PUBLIC_BASE_URL"))
            .unwrap_or(defaults.base_url);

        Ok(Self {
            listen_addr,
            db_path: var("ADPULSE_DB_PATH").map(PathBuf::from),
            base_url: base_url.trim_end_matches('/').to_string(),
            openai_api_key: var("OPENAI_API_KEY"),
            upstream_timeout: Duration::from_secs(parse_number(
                &var,
                "ADPULSE_UPSTREAM_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )?),
            report_rate_limit: parse_number(
                &var,
                "ADPULSE_REPORT_RATE_LIMIT",
                DEFAULT_REPORT_RATE_LIMIT,
            )?,
            report_rate_window: Duration::from_secs(parse_number(
                &var,
                "ADPULSE_REPORT_RATE_WINDOW_SECS",
                DEFAULT_REPORT_RATE_WINDOW_SECS,
            )?),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {key} {raw}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.report_rate_limit, 5);
        assert_eq!(config.report_rate_window, Duration::from_secs(60));
        assert!(config.openai_api_key.is_none());
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("ADPULSE_LISTEN_ADDR", "0.0.0.0:9000"),
            ("NEXT_PUBLIC_BASE_URL", "https://app.example.com/"),
            ("OPENAI_API_KEY", "sk-test"),
            ("ADPULSE_UPSTREAM_TIMEOUT_SECS", "3"),
            ("ADPULSE_REPORT_RATE_LIMIT", "10"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.base_url, "https://app.example.com");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
        assert_eq!(config.report_rate_limit, 10);
    }

    #[test]
    fn test_base_url_prefers_adpulse_var() {
        let config = config_from(&[
            ("ADPULSE_BASE_URL", "http://internal:4000"),
            ("NEXT_PUBLIC_BASE_URL", "https://app.example.com"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "http://internal:4000");
    }

    #[test]
    fn test_invalid_number() {
        let err = config_from(&[("ADPULSE_REPORT_RATE_LIMIT", "lots")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config_from(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(config.openai_api_key.is_none());
    }
}
