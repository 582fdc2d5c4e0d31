use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default start-to-start interval between aggregation cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Default number of symbols whose fundamentals are fetched concurrently.
pub const DEFAULT_FUNDAMENTALS_CONCURRENCY: usize = 4;

/// Default upstream fundamentals budget (Finnhub free tier).
pub const DEFAULT_FUNDAMENTALS_REQUESTS_PER_MINUTE: u32 = 60;

/// Runtime settings for the dashboard services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Optional API keys for providers that require them.
    /// Keys: provider name ("finnhub", "dify").
    pub api_keys: HashMap<String, String>,

    /// Base URL overrides per provider name ("yahoo", "finnhub", "dify").
    #[serde(default)]
    pub base_urls: HashMap<String, String>,

    /// Start-to-start interval between aggregation cycles.
    pub poll_interval: Duration,

    /// Maximum number of symbols fetched from the fundamentals provider at once.
    pub fundamentals_concurrency: usize,

    /// Upstream fundamentals request budget.
    pub fundamentals_requests_per_minute: u32,

    /// User identifier sent to the chat provider.
    pub chat_user: String,
}

impl Settings {
    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys
            .get(provider)
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
    }

    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.base_urls.get(provider).map(String::as_str)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_keys: HashMap::new(),
            base_urls: HashMap::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            fundamentals_concurrency: DEFAULT_FUNDAMENTALS_CONCURRENCY,
            fundamentals_requests_per_minute: DEFAULT_FUNDAMENTALS_REQUESTS_PER_MINUTE,
            chat_user: "dashboard-user".to_string(),
        }
    }
}
