pub mod cache;
pub mod clock;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;

use std::sync::Arc;

use tokio::sync::watch;

use cache::{EarningsCache, FundamentalsBatchCache, QuoteCache};
use clock::{Clock, SystemClock};
use errors::CoreError;
use models::{
    chat::ChatReply,
    fundamentals::FundamentalsOutcome,
    holding::{holding_symbols, Holding},
    portfolio::DashboardState,
    quote::QuoteOutcome,
    settings::Settings,
};
use providers::{rate_limiter::RateLimitConfig, registry::ProviderSet};
use services::{
    aggregator_service::Aggregator, chat_service::ChatService,
    fundamentals_service::FundamentalsService, quote_service::QuoteService,
};

/// Main entry point for the Portfolio Dashboard core library.
/// Owns the caches, the services built on them and the aggregator that
/// publishes dashboard snapshots.
#[must_use]
pub struct PortfolioDashboard {
    settings: Settings,
    quote_service: Arc<QuoteService>,
    fundamentals_service: Arc<FundamentalsService>,
    chat_service: ChatService,
    aggregator: Arc<Aggregator>,
}

impl std::fmt::Debug for PortfolioDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioDashboard")
            .field("holdings", &self.aggregator.holdings().len())
            .field("poll_interval", &self.settings.poll_interval)
            .field("cached_quote_sets", &self.quote_service.cache().len())
            .field(
                "cached_earnings",
                &self.fundamentals_service.earnings_cache().len(),
            )
            .finish()
    }
}

impl PortfolioDashboard {
    /// Build a dashboard talking to the real upstream providers.
    pub fn new(settings: Settings, holdings: Vec<Holding>) -> Self {
        let providers = ProviderSet::from_settings(&settings);
        Self::with_providers(settings, holdings, providers, Arc::new(SystemClock))
    }

    /// Build a dashboard on explicit providers and clock.
    pub fn with_providers(
        settings: Settings,
        holdings: Vec<Holding>,
        providers: ProviderSet,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let quote_service = Arc::new(QuoteService::new(
            providers.quotes,
            Arc::new(QuoteCache::new()),
            Arc::clone(&clock),
        ));

        let rate_limit = RateLimitConfig {
            requests_per_minute: settings.fundamentals_requests_per_minute,
            ..RateLimitConfig::default()
        };
        let fundamentals_service = Arc::new(
            FundamentalsService::new(
                providers.fundamentals,
                Arc::new(EarningsCache::new()),
                Arc::new(FundamentalsBatchCache::new()),
                Arc::clone(&clock),
            )
            .with_concurrency(settings.fundamentals_concurrency)
            .with_rate_limit(rate_limit),
        );

        let chat_service = ChatService::new(providers.chat);

        let aggregator = Arc::new(Aggregator::new(
            holdings,
            Arc::clone(&quote_service),
            Arc::clone(&fundamentals_service),
            clock,
        ));

        Self {
            settings,
            quote_service,
            fundamentals_service,
            chat_service,
            aggregator,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn holdings(&self) -> &[Holding] {
        self.aggregator.holdings()
    }

    /// Unique symbols of the configured holdings, in holding order.
    #[must_use]
    pub fn holding_symbols(&self) -> Vec<String> {
        holding_symbols(self.aggregator.holdings())
    }

    // ── Market Data ─────────────────────────────────────────────────

    /// Current prices, with the quote fallback cache applied.
    pub async fn get_quotes(&self, symbols: &[String]) -> Result<QuoteOutcome, CoreError> {
        self.quote_service.get_quotes(symbols).await
    }

    /// P/E ratios and latest earnings, with both cache tiers applied.
    pub async fn get_fundamentals(
        &self,
        symbols: &[String],
    ) -> Result<FundamentalsOutcome, CoreError> {
        self.fundamentals_service.get_fundamentals(symbols).await
    }

    // ── Chat ────────────────────────────────────────────────────────

    pub async fn ask(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply, CoreError> {
        self.chat_service.ask(message, conversation_id).await
    }

    // ── Dashboard State ─────────────────────────────────────────────

    /// Run one aggregation cycle now and return the published state.
    pub async fn refresh(&self) -> DashboardState {
        self.aggregator.run_tick().await
    }

    #[must_use]
    pub fn current_state(&self) -> DashboardState {
        self.aggregator.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.aggregator.subscribe()
    }

    #[must_use]
    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }
}
