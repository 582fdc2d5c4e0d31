use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::chat::ChatReply;
use crate::models::fundamentals::EarningsReport;
use crate::models::quote::Quote;

/// Source of current market prices.
///
/// Implementations issue ONE batched upstream request per call. When the
/// upstream reports a partial result, the symbols it could not price come back
/// with `price: None`; only a call with no usable result at all is an `Err`.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Get the current price of every requested symbol.
    async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, CoreError>;
}

/// Source of per-symbol fundamentals.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Fails when the provider cannot serve any request at all (e.g. missing
    /// credentials). Checked once per batch before fanning out.
    fn check_ready(&self) -> Result<(), CoreError> {
        Ok(())
    }

    /// Trailing P/E ratio. Volatile: never served from cache.
    async fn get_pe_ratio(&self, symbol: &str) -> Result<Option<f64>, CoreError>;

    /// Most recent earnings reports, newest first.
    async fn get_earnings(&self, symbol: &str) -> Result<Vec<EarningsReport>, CoreError>;
}

/// Conversational AI backend that answers with a server-sent event stream.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Send `message`, optionally continuing an existing conversation, and
    /// accumulate the streamed answer.
    async fn ask(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply, CoreError>;
}
