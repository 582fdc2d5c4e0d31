use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::errors::CoreError;
use crate::models::fundamentals::Fundamentals;

#[derive(Debug, Clone)]
struct Batch {
    results: Vec<Fundamentals>,
    stored_at: DateTime<Utc>,
}

/// The latest complete fundamentals batch, kept as last-known-good fallback.
///
/// No TTL: every successful call overwrites it, and it is only read when a
/// symbol (or the whole call) fails.
#[derive(Debug, Default)]
pub struct FundamentalsBatchCache {
    latest: RwLock<Option<Batch>>,
}

impl FundamentalsBatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for `symbol` from the latest batch.
    pub fn get(&self, symbol: &str) -> Option<Fundamentals> {
        let latest = self.latest.read().unwrap_or_else(|e| e.into_inner());
        latest
            .as_ref()
            .and_then(|batch| batch.results.iter().find(|f| f.symbol == symbol))
            .cloned()
    }

    /// The whole latest batch.
    pub fn get_all(&self) -> Option<Vec<Fundamentals>> {
        let latest = self.latest.read().unwrap_or_else(|e| e.into_inner());
        latest.as_ref().map(|batch| batch.results.clone())
    }

    /// Replace the cached batch unconditionally.
    pub fn put(&self, results: Vec<Fundamentals>, now: DateTime<Utc>) -> Result<(), CoreError> {
        let mut latest = self
            .latest
            .write()
            .map_err(|_| CoreError::Cache("fundamentals cache lock poisoned".into()))?;
        *latest = Some(Batch {
            results,
            stored_at: now,
        });
        Ok(())
    }

    /// The batch has no TTL: it is valid whenever one exists.
    pub fn is_valid(&self, _now: DateTime<Utc>) -> bool {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|batch| batch.stored_at)
    }
}
