use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// A position in the operator-configured portfolio.
///
/// Holdings are static: they are loaded once at start-up and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    /// Ticker symbol, uppercased (e.g., "AAPL")
    pub symbol: String,

    /// Human-readable name (e.g., "Apple Inc."). Defaults to the symbol.
    #[serde(default)]
    pub name: String,

    /// Price paid per share
    pub purchase_price: f64,

    /// Number of shares held
    pub quantity: f64,

    /// Listing exchange code (e.g., "NASDAQ", "NYSE")
    #[serde(default)]
    pub exchange: String,

    /// Industry sector used for grouping. Empty means "ungrouped".
    #[serde(default)]
    pub sector: String,
}

impl Holding {
    pub fn new(
        symbol: impl Into<String>,
        purchase_price: f64,
        quantity: f64,
        exchange: impl Into<String>,
        sector: impl Into<String>,
    ) -> Self {
        let symbol = symbol.into().trim().to_uppercase();
        Self {
            name: symbol.clone(),
            symbol,
            purchase_price,
            quantity,
            exchange: exchange.into(),
            sector: sector.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reject holdings that would poison the portfolio totals.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbol.is_empty() {
            return Err(CoreError::Validation("Holding symbol must not be empty".into()));
        }
        if !self.purchase_price.is_finite() || self.purchase_price < 0.0 {
            return Err(CoreError::Validation(format!(
                "Purchase price for {} must be finite and non-negative, got {}",
                self.symbol, self.purchase_price
            )));
        }
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(CoreError::Validation(format!(
                "Quantity for {} must be finite and non-negative, got {}",
                self.symbol, self.quantity
            )));
        }
        Ok(())
    }
}

/// Parse a JSON array of holdings, normalising symbols and names.
pub fn parse_holdings(json: &str) -> Result<Vec<Holding>, CoreError> {
    let mut holdings: Vec<Holding> = serde_json::from_str(json)
        .map_err(|e| CoreError::Config(format!("Invalid holdings file: {e}")))?;

    if holdings.is_empty() {
        return Err(CoreError::Config("Holdings file contains no positions".into()));
    }

    for holding in &mut holdings {
        holding.symbol = holding.symbol.trim().to_uppercase();
        if holding.name.trim().is_empty() {
            holding.name = holding.symbol.clone();
        }
        holding.validate()?;
    }

    Ok(holdings)
}

/// Unique symbols of the given holdings, in first-seen order.
pub fn holding_symbols(holdings: &[Holding]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    holdings
        .iter()
        .filter(|h| seen.insert(h.symbol.as_str()))
        .map(|h| h.symbol.clone())
        .collect()
}

/// The sample portfolio used when no holdings file is configured.
pub fn default_holdings() -> Vec<Holding> {
    vec![
        Holding::new("AAPL", 150.25, 10.0, "NASDAQ", "Technology").with_name("Apple Inc."),
        Holding::new("MSFT", 240.50, 5.0, "NASDAQ", "Technology")
            .with_name("Microsoft Corporation"),
        Holding::new("GOOGL", 160.00, 2.0, "NASDAQ", "Technology").with_name("Alphabet Inc."),
        Holding::new("AMZN", 198.00, 3.0, "NASDAQ", "Technology").with_name("Amazon.com, Inc."),
        Holding::new("META", 330.00, 8.0, "NASDAQ", "Technology")
            .with_name("Meta Platforms, Inc."),
        Holding::new("TSLA", 300.00, 10.0, "NASDAQ", "Technology").with_name("Tesla, Inc."),
        Holding::new("NFLX", 550.00, 6.0, "NASDAQ", "Technology").with_name("Netflix, Inc."),
        // Financial
        Holding::new("JPM", 140.00, 5.0, "NYSE", "Financial").with_name("JPMorgan Chase & Co."),
        Holding::new("BAC", 35.50, 15.0, "NYSE", "Financial").with_name("Bank of America Corp."),
        Holding::new("GS", 320.00, 3.0, "NYSE", "Financial")
            .with_name("Goldman Sachs Group Inc."),
        // Power
        Holding::new("NEE", 75.00, 8.0, "NYSE", "Power").with_name("NextEra Energy, Inc."),
        Holding::new("DUK", 95.00, 6.0, "NYSE", "Power").with_name("Duke Energy Corporation"),
    ]
}

/// Split a comma-separated symbol list ("AAPL, msft,,GOOGL").
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.to_string()).collect()
}

/// Trim, uppercase and de-duplicate symbols, preserving first-seen order.
/// An empty result is a validation error.
pub fn normalize_symbols(raw: &[String]) -> Result<Vec<String>, CoreError> {
    let mut seen = std::collections::HashSet::new();
    let symbols: Vec<String> = raw
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect();

    if symbols.is_empty() {
        return Err(CoreError::Validation("No symbols provided".into()));
    }
    Ok(symbols)
}
