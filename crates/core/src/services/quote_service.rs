use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::QuoteCache;
use crate::clock::Clock;
use crate::errors::CoreError;
use crate::models::holding::normalize_symbols;
use crate::models::quote::{Quote, QuoteOutcome, QuoteStatus};
use crate::providers::traits::QuoteProvider;

/// Fetches current prices with a short-lived fallback cache.
///
/// Cache strategy:
/// - Symbols the live batch could not price are filled from an unexpired
///   cache entry for the same symbol set.
/// - Every successful live fetch seeds the cache with the merged batch, so a
///   cached price survives consecutive partial batches. A failed write is
///   logged, never surfaced.
/// - Expired entries are pruned on every write; keys come from client input.
/// - If the live fetch fails outright, an unexpired entry is served as-is;
///   otherwise every symbol comes back with `price: None` and the outcome is
///   marked [`QuoteStatus::Unavailable`].
pub struct QuoteService {
    provider: Arc<dyn QuoteProvider>,
    cache: Arc<QuoteCache>,
    clock: Arc<dyn Clock>,
}

impl QuoteService {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        cache: Arc<QuoteCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            cache,
            clock,
        }
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Get one quote per requested symbol. Only an empty symbol set is an error.
    pub async fn get_quotes(&self, symbols: &[String]) -> Result<QuoteOutcome, CoreError> {
        let symbols = normalize_symbols(symbols)?;
        let key = QuoteCache::key_for(&symbols);

        match self.provider.get_quotes(&symbols).await {
            Ok(live) => {
                let now = self.clock.now();
                // Read before seeding: the fill-in must see the previous batch.
                let previous = self.cache.get(&key, now);
                let outcome = fill_missing(align(&symbols, live), previous);
                self.seed_cache(&key, outcome.quotes.clone());
                Ok(outcome)
            }
            Err(err) => {
                self.log_fetch_failure(&err);
                Ok(self.fallback(&symbols, &key))
            }
        }
    }

    fn seed_cache(&self, key: &str, quotes: Vec<Quote>) {
        let now = self.clock.now();
        let pruned = self.cache.prune(now);
        if pruned > 0 {
            debug!("Pruned {pruned} expired quote cache entries");
        }
        if let Err(e) = self.cache.put(key, quotes, now) {
            warn!("Failed to update quote cache, continuing anyway: {e}");
        }
    }

    fn fallback(&self, symbols: &[String], key: &str) -> QuoteOutcome {
        if let Some(cached) = self.cache.get(key, self.clock.now()) {
            if !cached.is_empty() {
                info!("Using cached quotes for {key}");
                let quotes = align(symbols, cached);
                let status = if quotes.iter().any(|q| q.price.is_some()) {
                    QuoteStatus::Cached
                } else {
                    QuoteStatus::Unavailable
                };
                return QuoteOutcome { quotes, status };
            }
        }

        warn!("No cached quotes for {key}; returning unavailable prices");
        QuoteOutcome {
            quotes: symbols.iter().map(Quote::unavailable).collect(),
            status: QuoteStatus::Unavailable,
        }
    }

    fn log_fetch_failure(&self, err: &CoreError) {
        match err.network_kind() {
            Some(kind) => warn!("{} network error ({kind}): {err}", self.provider.name()),
            None => warn!("{} quote fetch failed: {err}", self.provider.name()),
        }
    }
}

/// One quote per requested symbol, in request order.
fn align(symbols: &[String], quotes: Vec<Quote>) -> Vec<Quote> {
    let mut by_symbol: HashMap<String, Option<f64>> = HashMap::new();
    for quote in quotes {
        let entry = by_symbol.entry(quote.symbol.to_uppercase()).or_insert(None);
        if entry.is_none() {
            *entry = quote.price;
        }
    }
    symbols
        .iter()
        .map(|symbol| Quote {
            symbol: symbol.clone(),
            price: by_symbol.get(symbol).copied().flatten(),
        })
        .collect()
}

fn fill_missing(live: Vec<Quote>, previous: Option<Vec<Quote>>) -> QuoteOutcome {
    let mut used_cache = false;
    let quotes: Vec<Quote> = live
        .into_iter()
        .map(|quote| {
            if quote.price.is_some() {
                return quote;
            }
            let cached = previous
                .as_ref()
                .and_then(|p| p.iter().find(|c| c.symbol == quote.symbol))
                .and_then(|c| c.price);
            match cached {
                Some(price) => {
                    debug!("Filled {} from quote cache", quote.symbol);
                    used_cache = true;
                    Quote::new(quote.symbol, price)
                }
                None => quote,
            }
        })
        .collect();

    let status = if quotes.iter().any(|q| q.price.is_none()) {
        QuoteStatus::Unavailable
    } else if used_cache {
        QuoteStatus::Cached
    } else {
        QuoteStatus::Fresh
    };

    QuoteOutcome { quotes, status }
}
