use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::errors::CoreError;
use crate::models::quote::Quote;

/// Lifetime of a fallback quote entry (5 minutes).
pub const QUOTE_CACHE_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
struct QuoteEntry {
    quotes: Vec<Quote>,
    stored_at: DateTime<Utc>,
}

/// Duration-bounded fallback cache of quote batches, keyed by the requested
/// symbol set.
///
/// Only consulted when the live upstream call fails. Writes are last-write-wins.
#[derive(Debug)]
pub struct QuoteCache {
    entries: RwLock<HashMap<String, QuoteEntry>>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(QUOTE_CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cache key for a symbol set: the symbols joined with commas, in request order.
    pub fn key_for(symbols: &[String]) -> String {
        symbols.join(",")
    }

    /// Get the batch stored under `key` if it has not expired at `now`.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Vec<Quote>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| self.entry_is_valid(entry, now))
            .map(|entry| entry.quotes.clone())
    }

    /// Store a batch under `key`, replacing whatever was there.
    pub fn put(&self, key: &str, quotes: Vec<Quote>, now: DateTime<Utc>) -> Result<(), CoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CoreError::Cache("quote cache lock poisoned".into()))?;
        entries.insert(
            key.to_string(),
            QuoteEntry {
                quotes,
                stored_at: now,
            },
        );
        Ok(())
    }

    /// Whether an unexpired entry exists for `key` at `now`.
    pub fn is_valid(&self, key: &str, now: DateTime<Utc>) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .is_some_and(|entry| self.entry_is_valid(entry, now))
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| now - entry.stored_at < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_is_valid(&self, entry: &QuoteEntry, now: DateTime<Utc>) -> bool {
        now - entry.stored_at < self.ttl
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}
