use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::QuoteProvider;
use crate::errors::CoreError;
use crate::models::quote::Quote;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const PROVIDER: &str = "Yahoo Finance";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; portfolio-dashboard/0.1)";

/// Yahoo Finance quote provider.
///
/// - **Free**: No API key required.
/// - **Batched**: all symbols go out in one `/v7/finance/quote` request.
/// - **Timeout**: 5 seconds; the quote fallback cache covers slow periods.
///
/// Yahoo answers partially when some symbols are unknown or fail: those are
/// missing from `result` (and may be described in `error`). Missing symbols
/// are returned with `price: None`.
pub struct YahooFinanceProvider {
    client: Client,
    base_url: String,
}

impl YahooFinanceProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for YahooFinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── Yahoo API response types ────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<QuoteResult>,
    #[serde(default)]
    error: Option<QuoteError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResult {
    symbol: String,
    #[serde(default)]
    regular_market_price: Option<f64>,
}

#[derive(Deserialize)]
struct QuoteError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl QuoteError {
    fn describe(&self) -> String {
        match (&self.code, &self.description) {
            (Some(code), Some(desc)) => format!("{code}: {desc}"),
            (None, Some(desc)) => desc.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unspecified upstream error".into(),
        }
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, CoreError> {
        let url = format!("{}/v7/finance/quote", self.base_url);
        let joined = symbols.join(",");
        debug!("Requesting {} quotes from {PROVIDER}", symbols.len());

        let response = self
            .client
            .get(&url)
            .query(&[("symbols", joined.as_str()), ("fields", "regularMarketPrice,symbol")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::RateLimited(PROVIDER.into()));
        }
        if !status.is_success() {
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Quote request failed with status {status}"),
            });
        }

        let envelope: QuoteEnvelope = response.json().await.map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quote response: {e}"),
        })?;

        resolve_batch(symbols, envelope.quote_response)
    }
}

/// Align an upstream batch with the requested symbols.
fn resolve_batch(symbols: &[String], response: QuoteResponse) -> Result<Vec<Quote>, CoreError> {
    if response.result.is_empty() {
        let message = response
            .error
            .map(|e| e.describe())
            .unwrap_or_else(|| "No quote data returned".into());
        return Err(CoreError::Api {
            provider: PROVIDER.into(),
            message,
        });
    }

    if let Some(err) = &response.error {
        warn!(
            "{PROVIDER} returned a partial batch ({} of {} symbols): {}",
            response.result.len(),
            symbols.len(),
            err.describe()
        );
    }

    let prices: HashMap<String, Option<f64>> = response
        .result
        .into_iter()
        .map(|r| (r.symbol.to_uppercase(), r.regular_market_price))
        .collect();

    Ok(symbols
        .iter()
        .map(|symbol| Quote {
            symbol: symbol.clone(),
            price: prices
                .get(&symbol.to_uppercase())
                .copied()
                .flatten()
                .filter(|p| p.is_finite() && *p >= 0.0),
        })
        .collect())
}
