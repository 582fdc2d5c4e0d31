use std::sync::Arc;

use tracing::warn;

use crate::models::settings::Settings;

use super::dify::DifyProvider;
use super::finnhub::FinnhubProvider;
use super::traits::{ChatProvider, FundamentalsProvider, QuoteProvider};
use super::yahoo_finance::YahooFinanceProvider;

/// The upstream providers one dashboard talks to.
///
/// Tests swap any of them for mocks by building the set by hand.
#[derive(Clone)]
pub struct ProviderSet {
    pub quotes: Arc<dyn QuoteProvider>,
    pub fundamentals: Arc<dyn FundamentalsProvider>,
    pub chat: Arc<dyn ChatProvider>,
}

impl ProviderSet {
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        fundamentals: Arc<dyn FundamentalsProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            quotes,
            fundamentals,
            chat,
        }
    }

    /// Build the default providers, honouring API keys and base URL overrides.
    pub fn from_settings(settings: &Settings) -> Self {
        // Yahoo Finance: quotes, no API key needed
        let quotes = match settings.base_url("yahoo") {
            Some(url) => YahooFinanceProvider::with_base_url(url),
            None => YahooFinanceProvider::new(),
        };

        // Finnhub: fundamentals, requires API key
        let finnhub_key = settings.api_key("finnhub").map(str::to_string);
        if finnhub_key.is_none() {
            warn!("No Finnhub API key configured; fundamentals will fall back to cache");
        }
        let fundamentals = match settings.base_url("finnhub") {
            Some(url) => FinnhubProvider::with_base_url(finnhub_key, url),
            None => FinnhubProvider::new(finnhub_key),
        };

        // Dify: chat, requires API key
        let dify_key = settings.api_key("dify").map(str::to_string);
        if dify_key.is_none() {
            warn!("No Dify API key configured; chat requests will be rejected");
        }
        let chat = match settings.base_url("dify") {
            Some(url) => DifyProvider::with_base_url(dify_key, settings.chat_user.clone(), url),
            None => DifyProvider::new(dify_key, settings.chat_user.clone()),
        };

        Self::new(Arc::new(quotes), Arc::new(fundamentals), Arc::new(chat))
    }
}
