pub mod rate_limiter;
pub mod registry;
pub mod sse;
pub mod traits;

// API provider implementations
pub mod dify;
pub mod finnhub;
pub mod yahoo_finance;

pub use registry::ProviderSet;
