use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::errors::CoreError;
use crate::models::fundamentals::EarningsReport;

/// Validity window of the stable earnings tier (7 days).
pub const EARNINGS_CACHE_TTL_DAYS: i64 = 7;

#[derive(Debug, Default)]
struct EarningsState {
    entries: HashMap<String, Vec<EarningsReport>>,
    /// Time of the most recent write for *any* symbol.
    stamped_at: Option<DateTime<Utc>>,
}

/// Stable tier of the fundamentals cache: quarterly earnings per symbol.
///
/// Validity is tracked by a single shared timestamp, not per entry: the tier is
/// valid while the newest write is younger than the window and at least one
/// entry exists. A symbol written late therefore refreshes the window for
/// every other symbol as well.
#[derive(Debug)]
pub struct EarningsCache {
    state: RwLock<EarningsState>,
    ttl: Duration,
}

impl EarningsCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::days(EARNINGS_CACHE_TTL_DAYS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(EarningsState::default()),
            ttl,
        }
    }

    /// Whether the whole tier is fresh at `now`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        match state.stamped_at {
            Some(stamped) => now - stamped < self.ttl && !state.entries.is_empty(),
            None => false,
        }
    }

    /// Cached earnings for `symbol`, regardless of tier validity.
    pub fn get(&self, symbol: &str) -> Option<Vec<EarningsReport>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.entries.get(symbol).cloned()
    }

    /// Cached earnings for `symbol` only if the tier is valid at `now`.
    pub fn get_fresh(&self, symbol: &str, now: DateTime<Utc>) -> Option<Vec<EarningsReport>> {
        if !self.is_valid(now) {
            return None;
        }
        self.get(symbol)
    }

    /// Store earnings for `symbol` and stamp the shared timestamp.
    pub fn put(
        &self,
        symbol: &str,
        reports: Vec<EarningsReport>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CoreError::Cache("earnings cache lock poisoned".into()))?;
        state.entries.insert(symbol.to_string(), reports);
        state.stamped_at = Some(now);
        Ok(())
    }

    pub fn stamped_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).stamped_at
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.entries.clear();
        state.stamped_at = None;
    }
}

impl Default for EarningsCache {
    fn default() -> Self {
        Self::new()
    }
}
