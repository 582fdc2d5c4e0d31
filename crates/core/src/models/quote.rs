use serde::{Deserialize, Serialize};

/// Current market price of a single symbol.
///
/// `price == None` means the price was unavailable this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Option<f64>,
}

impl Quote {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price: Some(price),
        }
    }

    pub fn unavailable(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: None,
        }
    }
}

/// Where the quotes in a [`QuoteOutcome`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuoteStatus {
    /// Every quote came from the live upstream call.
    Fresh,
    /// At least one quote was served from the fallback cache.
    Cached,
    /// At least one requested symbol has no price at all.
    Unavailable,
}

impl QuoteStatus {
    /// Value of the `X-Data-Source` response header.
    ///
    /// Differs from the serde form for `Cached`: the header says `cache`
    /// while snapshot JSON says `cached`.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Fresh => "fresh",
            QuoteStatus::Cached => "cache",
            QuoteStatus::Unavailable => "unavailable",
        }
    }
}

/// Result of a quote service call. Always carries one quote per requested symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteOutcome {
    pub quotes: Vec<Quote>,
    pub status: QuoteStatus,
}

impl QuoteOutcome {
    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.quotes
            .iter()
            .find(|q| q.symbol == symbol)
            .and_then(|q| q.price)
    }

    /// True if at least one quote carries a price.
    pub fn has_any_price(&self) -> bool {
        self.quotes.iter().any(|q| q.price.is_some())
    }
}
