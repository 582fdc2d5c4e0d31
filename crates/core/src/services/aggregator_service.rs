use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::errors::CoreError;
use crate::models::holding::{holding_symbols, Holding};
use crate::models::portfolio::{
    DashboardState, FundamentalsProvenance, PortfolioSnapshot, StockView,
};
use crate::services::fundamentals_service::FundamentalsService;
use crate::services::metrics_service::build_portfolio;
use crate::services::quote_service::QuoteService;

/// Joins holdings, quotes and fundamentals into portfolio snapshots and
/// publishes them through a watch channel.
///
/// A tick fails only when nothing usable came back: the quote service errored,
/// or fundamentals errored while no quote carried a price. A failed tick keeps
/// the previous snapshot visible and marks it stale.
pub struct Aggregator {
    holdings: Vec<Holding>,
    quotes: Arc<QuoteService>,
    fundamentals: Arc<FundamentalsService>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<DashboardState>,
}

impl Aggregator {
    pub fn new(
        holdings: Vec<Holding>,
        quotes: Arc<QuoteService>,
        fundamentals: Arc<FundamentalsService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self {
            holdings,
            quotes,
            fundamentals,
            clock,
            state,
        }
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn symbols(&self) -> Vec<String> {
        holding_symbols(&self.holdings)
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    /// The most recently published state.
    pub fn current(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Run one aggregation cycle and publish its outcome.
    ///
    /// The cycle runs on its own task so that a panic anywhere in the pipeline
    /// is published as an error state instead of taking down the caller.
    pub async fn run_tick(self: &Arc<Self>) -> DashboardState {
        let this = Arc::clone(self);
        let result = match tokio::spawn(async move { this.tick().await }).await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                error!("Portfolio refresh panicked");
                Err(CoreError::Internal("portfolio refresh panicked".into()))
            }
            Err(join_err) => Err(CoreError::Internal(format!(
                "portfolio refresh was cancelled: {join_err}"
            ))),
        };
        self.publish(result)
    }

    /// Build a snapshot without publishing it.
    pub async fn tick(&self) -> Result<PortfolioSnapshot, CoreError> {
        let symbols = self.symbols();
        let (quotes, fundamentals) = tokio::join!(
            self.quotes.get_quotes(&symbols),
            self.fundamentals.get_fundamentals(&symbols)
        );

        let quotes = quotes?;
        let fundamentals = match fundamentals {
            Ok(outcome) => Some(outcome),
            Err(e) if quotes.has_any_price() => {
                warn!("Fundamentals unavailable this cycle, continuing with prices only: {e}");
                None
            }
            Err(e) => return Err(e),
        };

        let stocks: Vec<StockView> = self
            .holdings
            .iter()
            .map(|holding| {
                let cmp = quotes.price_of(&holding.symbol).unwrap_or(0.0);
                let (pe_ratio, latest_earnings) = fundamentals
                    .as_ref()
                    .and_then(|f| f.get(&holding.symbol))
                    .map(|f| (f.pe_ratio, f.latest_earnings))
                    .unwrap_or((None, None));
                StockView::from_holding(holding, cmp, pe_ratio, latest_earnings)
            })
            .collect();

        let provenance = fundamentals
            .as_ref()
            .map(|f| FundamentalsProvenance::from(f.cache_usage))
            .unwrap_or(FundamentalsProvenance::Failed);

        Ok(PortfolioSnapshot::from_totals(
            build_portfolio(&stocks),
            self.clock.now(),
            quotes.status,
            provenance,
        ))
    }

    fn publish(&self, result: Result<PortfolioSnapshot, CoreError>) -> DashboardState {
        let next = match result {
            Ok(snapshot) => {
                info!(
                    "Portfolio refreshed: {} stocks, total value {:.2} ({})",
                    snapshot.stocks.len(),
                    snapshot.total_value,
                    snapshot.quote_status.as_str()
                );
                DashboardState::fresh(snapshot)
            }
            Err(e) => {
                error!("Portfolio refresh failed: {e}");
                DashboardState::failed(&self.state.borrow(), e.to_string())
            }
        };
        self.state.send_replace(next.clone());
        next
    }
}
