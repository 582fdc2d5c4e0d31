use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::cache::{EarningsCache, FundamentalsBatchCache};
use crate::clock::Clock;
use crate::errors::CoreError;
use crate::models::fundamentals::{
    latest_actual, CacheUsage, EarningsCacheState, EarningsReport, Fundamentals,
    FundamentalsOutcome,
};
use crate::models::holding::normalize_symbols;
use crate::models::settings::DEFAULT_FUNDAMENTALS_CONCURRENCY;
use crate::providers::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::providers::traits::FundamentalsProvider;

/// Upper bound for one symbol, including time spent waiting for a permit.
const PER_SYMBOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches P/E ratios and latest earnings with two cache tiers.
///
/// Cache strategy:
/// - **P/E (volatile)**: always fetched live. When that fails the symbol's
///   entry from the previous whole batch is served instead.
/// - **Earnings (stable)**: reused from [`EarningsCache`] while the tier is
///   valid, otherwise fetched and written back. A failed earnings fetch falls
///   back to whatever the tier holds, expired or not, and never fails the symbol.
/// - The whole result set overwrites [`FundamentalsBatchCache`] after every call
///   that reached the provider.
///
/// Symbols are fetched concurrently, bounded by a semaphore and a token-bucket
/// rate limiter shared by every upstream call.
pub struct FundamentalsService {
    provider: Arc<dyn FundamentalsProvider>,
    earnings_cache: Arc<EarningsCache>,
    batch_cache: Arc<FundamentalsBatchCache>,
    limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    clock: Arc<dyn Clock>,
}

impl FundamentalsService {
    pub fn new(
        provider: Arc<dyn FundamentalsProvider>,
        earnings_cache: Arc<EarningsCache>,
        batch_cache: Arc<FundamentalsBatchCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter = RateLimiter::new(provider.name(), RateLimitConfig::default());
        Self {
            provider,
            earnings_cache,
            batch_cache,
            limiter: Arc::new(limiter),
            semaphore: Arc::new(Semaphore::new(DEFAULT_FUNDAMENTALS_CONCURRENCY)),
            clock,
        }
    }

    /// Maximum number of symbols fetched at once (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.limiter = Arc::new(RateLimiter::new(self.provider.name(), config));
        self
    }

    pub fn earnings_cache(&self) -> &EarningsCache {
        &self.earnings_cache
    }

    pub fn batch_cache(&self) -> &FundamentalsBatchCache {
        &self.batch_cache
    }

    /// Get fundamentals for every requested symbol, one entry per symbol.
    ///
    /// Per-symbol failures never fail the call. The call itself fails only when
    /// the provider cannot serve anything and no previous batch exists.
    pub async fn get_fundamentals(
        &self,
        symbols: &[String],
    ) -> Result<FundamentalsOutcome, CoreError> {
        let symbols = normalize_symbols(symbols)?;

        let now = self.clock.now();
        let earnings_valid = self.earnings_cache.is_valid(now);
        let earnings_cache = if earnings_valid {
            EarningsCacheState::Used
        } else {
            EarningsCacheState::Refreshed
        };
        debug!(
            "Earnings cache {} ({} entries)",
            earnings_cache.as_str(),
            self.earnings_cache.len()
        );

        if let Err(e) = self.provider.check_ready() {
            error!("{} unavailable: {e}", self.provider.name());
            return self.complete_fallback(&symbols, earnings_cache, e);
        }

        let handles = symbols.iter().map(|symbol| {
            let job = SymbolJob {
                provider: Arc::clone(&self.provider),
                earnings_cache: Arc::clone(&self.earnings_cache),
                limiter: Arc::clone(&self.limiter),
                semaphore: Arc::clone(&self.semaphore),
                clock: Arc::clone(&self.clock),
                symbol: symbol.clone(),
                earnings_valid,
            };
            tokio::spawn(tokio::time::timeout(PER_SYMBOL_TIMEOUT, job.run()))
        });
        let joined = join_all(handles).await;

        let mut cache_usage = CacheUsage::None;
        let mut results = Vec::with_capacity(symbols.len());

        for (symbol, outcome) in symbols.iter().zip(joined) {
            let failure = match outcome {
                Ok(Ok(Ok(fundamentals))) => {
                    results.push(fundamentals);
                    continue;
                }
                Ok(Ok(Err(e))) => {
                    warn!("Fundamentals for {symbol} failed: {e}");
                    e.to_string()
                }
                Ok(Err(_)) => {
                    warn!(
                        "Fundamentals for {symbol} timed out after {}s",
                        PER_SYMBOL_TIMEOUT.as_secs()
                    );
                    format!("Timed out after {}s", PER_SYMBOL_TIMEOUT.as_secs())
                }
                Err(join_err) if join_err.is_panic() => {
                    error!("Fundamentals task for {symbol} panicked");
                    "Unexpected failure while fetching fundamentals".to_string()
                }
                Err(join_err) => {
                    error!("Fundamentals task for {symbol} was cancelled: {join_err}");
                    "Fundamentals request was cancelled".to_string()
                }
            };

            match self.batch_cache.get(symbol) {
                Some(cached) => {
                    info!("Using cached fundamentals for {symbol}");
                    cache_usage = CacheUsage::Partial;
                    results.push(cached);
                }
                None => results.push(Fundamentals::failed(symbol.as_str(), failure)),
            }
        }

        if let Err(e) = self.batch_cache.put(results.clone(), self.clock.now()) {
            warn!("Failed to update fundamentals cache, continuing anyway: {e}");
        }

        Ok(FundamentalsOutcome {
            results,
            cache_usage,
            earnings_cache,
        })
    }

    fn complete_fallback(
        &self,
        symbols: &[String],
        earnings_cache: EarningsCacheState,
        cause: CoreError,
    ) -> Result<FundamentalsOutcome, CoreError> {
        let Some(cached) = self.batch_cache.get_all() else {
            return Err(cause);
        };

        warn!("Serving the previous fundamentals batch for all symbols");
        let reason = cause.to_string();
        let results = symbols
            .iter()
            .map(|symbol| {
                cached
                    .iter()
                    .find(|f| &f.symbol == symbol)
                    .cloned()
                    .unwrap_or_else(|| Fundamentals::failed(symbol.as_str(), reason.clone()))
            })
            .collect();

        Ok(FundamentalsOutcome {
            results,
            cache_usage: CacheUsage::CompleteFallback,
            earnings_cache,
        })
    }
}

/// Everything one spawned per-symbol task needs.
struct SymbolJob {
    provider: Arc<dyn FundamentalsProvider>,
    earnings_cache: Arc<EarningsCache>,
    limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    clock: Arc<dyn Clock>,
    symbol: String,
    earnings_valid: bool,
}

impl SymbolJob {
    /// `Err` only when the P/E fetch fails.
    async fn run(self) -> Result<Fundamentals, CoreError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CoreError::Internal("fundamentals semaphore closed".into()))?;

        let cached = if self.earnings_valid {
            self.earnings_cache.get(&self.symbol)
        } else {
            None
        };

        let (pe_ratio, latest_earnings) = match cached {
            Some(reports) => {
                debug!("Reusing cached earnings for {}", self.symbol);
                (self.fetch_pe_ratio().await, latest_actual(&reports))
            }
            None => {
                let (pe_ratio, earnings) =
                    tokio::join!(self.fetch_pe_ratio(), self.fetch_earnings());
                (pe_ratio, self.store_earnings(earnings))
            }
        };

        Ok(Fundamentals::new(self.symbol.as_str(), pe_ratio?, latest_earnings))
    }

    async fn fetch_pe_ratio(&self) -> Result<Option<f64>, CoreError> {
        self.limiter.acquire().await;
        self.provider.get_pe_ratio(&self.symbol).await
    }

    async fn fetch_earnings(&self) -> Result<Vec<EarningsReport>, CoreError> {
        self.limiter.acquire().await;
        self.provider.get_earnings(&self.symbol).await
    }

    /// Write fresh earnings to the stable tier, or fall back to it on failure.
    fn store_earnings(&self, earnings: Result<Vec<EarningsReport>, CoreError>) -> Option<f64> {
        match earnings {
            Ok(reports) => {
                let latest = latest_actual(&reports);
                if let Err(e) = self.earnings_cache.put(&self.symbol, reports, self.clock.now()) {
                    warn!("Failed to update earnings cache for {}: {e}", self.symbol);
                }
                latest
            }
            Err(e) => {
                warn!("Earnings fetch for {} failed: {e}", self.symbol);
                self.earnings_cache
                    .get(&self.symbol)
                    .and_then(|reports| latest_actual(&reports))
            }
        }
    }
}
