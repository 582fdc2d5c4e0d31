use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::traits::FundamentalsProvider;
use crate::errors::CoreError;
use crate::models::fundamentals::EarningsReport;

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER: &str = "Finnhub";

/// Finnhub fundamentals provider.
///
/// - **Requires**: API key (settings key "finnhub").
/// - **Free tier**: 60 calls/minute; callers gate requests with a rate limiter.
/// - **Endpoints**: `/stock/metric` (P/E, volatile) and `/stock/earnings`
///   (quarterly EPS, stable).
pub struct FinnhubProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl FinnhubProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// GET an endpoint and decode its JSON body.
    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, CoreError> {
        let api_key = self.api_key.as_deref().ok_or_else(missing_key)?;
        let url = format!("{}{}", self.base_url, endpoint);

        debug!("{PROVIDER} request: {endpoint} {params:?}");

        // Token goes in a header so it never shows up in logged URLs.
        let response = self
            .client
            .get(&url)
            .header("X-Finnhub-Token", api_key)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::RateLimited(PROVIDER.into()));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Invalid or missing API key ({status})"),
            });
        }
        if !status.is_success() {
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("{endpoint} failed with status {status}"),
            });
        }

        response.json().await.map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse {endpoint} response: {e}"),
        })
    }
}

fn missing_key() -> CoreError {
    CoreError::Config("Finnhub API key is not configured".into())
}

// ── Finnhub API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: Option<Metric>,
}

#[derive(Deserialize)]
struct Metric {
    #[serde(rename = "peTTM", default)]
    pe_ttm: Option<f64>,
}

#[async_trait]
impl FundamentalsProvider for FinnhubProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn check_ready(&self) -> Result<(), CoreError> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(missing_key()),
        }
    }

    async fn get_pe_ratio(&self, symbol: &str) -> Result<Option<f64>, CoreError> {
        let resp: MetricResponse = self
            .fetch("/stock/metric", &[("symbol", symbol), ("metric", "all")])
            .await?;

        // Finnhub reports missing metrics as 0 or omits them.
        Ok(resp
            .metric
            .and_then(|m| m.pe_ttm)
            .filter(|pe| pe.is_finite() && *pe != 0.0))
    }

    async fn get_earnings(&self, symbol: &str) -> Result<Vec<EarningsReport>, CoreError> {
        self.fetch("/stock/earnings", &[("symbol", symbol), ("limit", "1")])
            .await
    }
}
