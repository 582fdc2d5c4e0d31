use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use portfolio_dashboard_core::models::holding::{default_holdings, parse_holdings, Holding};
use portfolio_dashboard_core::PortfolioDashboard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub dashboard: Arc<PortfolioDashboard>,
}

impl AppState {
    pub fn new(dashboard: PortfolioDashboard) -> Arc<Self> {
        Arc::new(Self {
            dashboard: Arc::new(dashboard),
        })
    }
}

pub fn init_tracing() {
    let log_format = std::env::var("PD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn load_holdings(path: Option<&Path>) -> anyhow::Result<Vec<Holding>> {
    let Some(path) = path else {
        tracing::info!("No holdings file configured; using the sample portfolio");
        return Ok(default_holdings());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read holdings file {}", path.display()))?;
    let holdings = parse_holdings(&json)?;
    tracing::info!("Loaded {} holdings from {}", holdings.len(), path.display());
    Ok(holdings)
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let holdings = load_holdings(config.holdings_path.as_deref())?;
    let dashboard = PortfolioDashboard::new(config.settings.clone(), holdings);
    tracing::debug!("{dashboard:?}");
    Ok(AppState::new(dashboard))
}
