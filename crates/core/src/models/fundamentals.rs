use serde::{Deserialize, Serialize};

/// P/E ratio and latest earnings of a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    pub symbol: String,
    pub pe_ratio: Option<f64>,
    pub latest_earnings: Option<f64>,
    /// Set when the symbol failed and no cached fallback existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Fundamentals {
    pub fn new(
        symbol: impl Into<String>,
        pe_ratio: Option<f64>,
        latest_earnings: Option<f64>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            pe_ratio,
            latest_earnings,
            error: None,
        }
    }

    pub fn failed(symbol: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            pe_ratio: None,
            latest_earnings: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One reported earnings period, most recent first in provider responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsReport {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub actual: Option<f64>,
    #[serde(default)]
    pub estimate: Option<f64>,
}

/// Latest reported EPS out of a provider earnings list.
///
/// The provider reports missing values as `0`, so zero counts as absent.
pub fn latest_actual(reports: &[EarningsReport]) -> Option<f64> {
    reports
        .first()
        .and_then(|r| r.actual)
        .filter(|v| v.is_finite() && *v != 0.0)
}

/// How much of a fundamentals response was served from the whole-batch cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheUsage {
    None,
    Partial,
    CompleteFallback,
}

impl CacheUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheUsage::None => "none",
            CacheUsage::Partial => "partial",
            CacheUsage::CompleteFallback => "complete-fallback",
        }
    }
}

/// Whether the stable earnings tier was valid when the call started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EarningsCacheState {
    Used,
    Refreshed,
}

impl EarningsCacheState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningsCacheState::Used => "used",
            EarningsCacheState::Refreshed => "refreshed",
        }
    }
}

/// Result of a fundamentals service call.
#[derive(Debug, Clone, PartialEq)]
pub struct FundamentalsOutcome {
    pub results: Vec<Fundamentals>,
    pub cache_usage: CacheUsage,
    pub earnings_cache: EarningsCacheState,
}

impl FundamentalsOutcome {
    pub fn get(&self, symbol: &str) -> Option<&Fundamentals> {
        self.results.iter().find(|f| f.symbol == symbol)
    }
}
