//! In-memory caches owned by the quote and fundamentals services.
//!
//! Each cache exposes the same small contract: `get`, `put` and `is_valid(now)`.
//! Reads recover from lock poisoning; writes report it as [`CoreError::Cache`]
//! so callers can log and carry on.
//!
//! [`CoreError::Cache`]: crate::errors::CoreError::Cache

pub mod earnings_cache;
pub mod fundamentals_cache;
pub mod quote_cache;

pub use earnings_cache::EarningsCache;
pub use fundamentals_cache::FundamentalsBatchCache;
pub use quote_cache::QuoteCache;
