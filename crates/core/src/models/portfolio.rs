use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fundamentals::CacheUsage;
use super::holding::Holding;
use super::quote::QuoteStatus;

/// A holding joined with market data and its derived metrics.
///
/// Recomputed every poll; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockView {
    pub symbol: String,
    pub name: String,
    pub purchase_price: f64,
    pub quantity: f64,
    pub exchange: String,
    pub sector: String,

    /// Current market price. `0.0` when no quote was available (rendered "N/A").
    pub cmp: f64,

    /// purchase_price × quantity
    pub investment: f64,

    /// cmp × quantity
    pub present_value: f64,

    /// present_value − investment
    pub gain_loss: f64,

    /// gain_loss / investment × 100, or 0 when nothing was invested
    pub gain_loss_percentage: f64,

    /// present_value / total portfolio value × 100, or 0 when the total is 0
    pub portfolio_percentage: f64,

    pub pe_ratio: Option<f64>,
    pub latest_earnings: Option<f64>,
}

impl StockView {
    /// Start a view from a holding with raw market inputs; derived fields are
    /// zero until the metrics calculator fills them in.
    pub fn from_holding(
        holding: &Holding,
        cmp: f64,
        pe_ratio: Option<f64>,
        latest_earnings: Option<f64>,
    ) -> Self {
        Self {
            symbol: holding.symbol.clone(),
            name: holding.name.clone(),
            purchase_price: holding.purchase_price,
            quantity: holding.quantity,
            exchange: holding.exchange.clone(),
            sector: holding.sector.clone(),
            cmp,
            investment: 0.0,
            present_value: 0.0,
            gain_loss: 0.0,
            gain_loss_percentage: 0.0,
            portfolio_percentage: 0.0,
            pe_ratio,
            latest_earnings,
        }
    }

    /// True when no market price was available for this stock.
    pub fn price_unavailable(&self) -> bool {
        self.cmp == 0.0
    }
}

/// Aggregated totals of one sector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorTotals {
    /// Symbols that belong to this sector, in portfolio order
    pub symbols: Vec<String>,
    pub total_investment: f64,
    pub total_value: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_percentage: f64,
}

/// Portfolio-level totals plus the recomputed stock views.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTotals {
    pub stocks: Vec<StockView>,
    pub total_investment: f64,
    pub total_value: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_percentage: f64,
    /// Sector name → totals. Sorted by sector name for stable output.
    pub sector_totals: BTreeMap<String, SectorTotals>,
}

/// The published result of one aggregation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub stocks: Vec<StockView>,
    pub total_investment: f64,
    pub total_value: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_percentage: f64,
    pub sector_totals: BTreeMap<String, SectorTotals>,

    /// When this snapshot was built
    pub generated_at: DateTime<Utc>,

    /// Provenance of the quotes used
    pub quote_status: QuoteStatus,

    /// Provenance of the fundamentals used
    pub fundamentals_cache: FundamentalsProvenance,
}

impl PortfolioSnapshot {
    pub fn from_totals(
        totals: PortfolioTotals,
        generated_at: DateTime<Utc>,
        quote_status: QuoteStatus,
        fundamentals_cache: FundamentalsProvenance,
    ) -> Self {
        Self {
            stocks: totals.stocks,
            total_investment: totals.total_investment,
            total_value: totals.total_value,
            total_gain_loss: totals.total_gain_loss,
            total_gain_loss_percentage: totals.total_gain_loss_percentage,
            sector_totals: totals.sector_totals,
            generated_at,
            quote_status,
            fundamentals_cache,
        }
    }

    pub fn stock(&self, symbol: &str) -> Option<&StockView> {
        self.stocks.iter().find(|s| s.symbol == symbol)
    }
}

/// Where the fundamentals of a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FundamentalsProvenance {
    None,
    Partial,
    CompleteFallback,
    /// The fundamentals call failed outright; every P/E and EPS is null.
    Failed,
}

impl From<CacheUsage> for FundamentalsProvenance {
    fn from(usage: CacheUsage) -> Self {
        match usage {
            CacheUsage::None => FundamentalsProvenance::None,
            CacheUsage::Partial => FundamentalsProvenance::Partial,
            CacheUsage::CompleteFallback => FundamentalsProvenance::CompleteFallback,
        }
    }
}

/// What the dashboard should currently display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    /// Latest successfully built snapshot, if any
    pub snapshot: Option<Arc<PortfolioSnapshot>>,

    /// When the latest successful tick finished
    pub last_updated: Option<DateTime<Utc>>,

    /// Message of the most recent failed tick. Cleared on the next success.
    pub error: Option<String>,

    /// True when `snapshot` predates a failed tick.
    pub stale: bool,
}

impl DashboardState {
    pub fn fresh(snapshot: PortfolioSnapshot) -> Self {
        let last_updated = Some(snapshot.generated_at);
        Self {
            snapshot: Some(Arc::new(snapshot)),
            last_updated,
            error: None,
            stale: false,
        }
    }

    /// Keep the previous snapshot visible but flag it as stale.
    pub fn failed(previous: &DashboardState, error: impl Into<String>) -> Self {
        Self {
            snapshot: previous.snapshot.clone(),
            last_updated: previous.last_updated,
            error: Some(error.into()),
            stale: previous.snapshot.is_some(),
        }
    }
}
