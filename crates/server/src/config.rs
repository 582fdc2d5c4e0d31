use std::{collections::HashMap, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use portfolio_dashboard_core::models::settings::{
    Settings, DEFAULT_FUNDAMENTALS_CONCURRENCY, DEFAULT_FUNDAMENTALS_REQUESTS_PER_MINUTE,
};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    /// JSON holdings file. `None` means the built-in sample portfolio.
    pub holdings_path: Option<PathBuf>,
    pub settings: Settings,
}

impl Config {
    /// Read the process environment. `main` loads `.env` into it first.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a config from any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let listen_addr: SocketAddr = non_empty("PD_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid PD_LISTEN_ADDR")?;

        let cors_allow = non_empty("PD_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let timeout_ms: u64 = parse_or(
            "PD_REQUEST_TIMEOUT_MS",
            non_empty("PD_REQUEST_TIMEOUT_MS"),
            30_000,
        )?;
        let poll_secs: u64 = parse_or(
            "PD_POLL_INTERVAL_SECS",
            non_empty("PD_POLL_INTERVAL_SECS"),
            15,
        )?;
        if poll_secs == 0 {
            bail!("PD_POLL_INTERVAL_SECS must be at least 1");
        }
        let concurrency: usize = parse_or(
            "PD_FUNDAMENTALS_CONCURRENCY",
            non_empty("PD_FUNDAMENTALS_CONCURRENCY"),
            DEFAULT_FUNDAMENTALS_CONCURRENCY,
        )?;
        let requests_per_minute: u32 = parse_or(
            "PD_FINNHUB_REQUESTS_PER_MINUTE",
            non_empty("PD_FINNHUB_REQUESTS_PER_MINUTE"),
            DEFAULT_FUNDAMENTALS_REQUESTS_PER_MINUTE,
        )?;

        let mut api_keys = HashMap::new();
        for (provider, key) in [("finnhub", "FINNHUB_API_KEY"), ("dify", "DIFY_API_KEY")] {
            match non_empty(key) {
                Some(value) => {
                    api_keys.insert(provider.to_string(), value);
                }
                None => tracing::warn!("{key} is not set"),
            }
        }

        let mut base_urls = HashMap::new();
        for (provider, key) in [
            ("yahoo", "PD_QUOTES_BASE_URL"),
            ("finnhub", "PD_FINNHUB_BASE_URL"),
            ("dify", "PD_DIFY_BASE_URL"),
        ] {
            if let Some(url) = non_empty(key) {
                base_urls.insert(provider.to_string(), url);
            }
        }

        let defaults = Settings::default();
        let settings = Settings {
            api_keys,
            base_urls,
            poll_interval: Duration::from_secs(poll_secs),
            fundamentals_concurrency: concurrency.max(1),
            fundamentals_requests_per_minute: requests_per_minute.max(1),
            chat_user: non_empty("PD_DIFY_USER").unwrap_or(defaults.chat_user),
        };

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            holdings_path: non_empty("PD_HOLDINGS_PATH").map(PathBuf::from),
            settings,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid {key}: {value:?}")),
        None => Ok(default),
    }
}
