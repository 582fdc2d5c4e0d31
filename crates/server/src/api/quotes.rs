use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use portfolio_dashboard_core::models::holding::parse_symbol_list;
use portfolio_dashboard_core::models::quote::QuoteStatus;
use serde::Deserialize;

use crate::{error::ApiResult, main_lib::AppState};

pub const DATA_SOURCE_HEADER: &str = "x-data-source";

#[derive(Deserialize)]
struct QuotesQuery {
    symbols: Option<String>,
}

/// Without `symbols` the configured holdings are quoted.
async fn get_quotes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuotesQuery>,
) -> ApiResult<Response> {
    let symbols = match query.symbols {
        Some(raw) => parse_symbol_list(&raw),
        None => state.dashboard.holding_symbols(),
    };

    let outcome = state.dashboard.get_quotes(&symbols).await?;
    let status = match outcome.status {
        QuoteStatus::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        QuoteStatus::Fresh | QuoteStatus::Cached => StatusCode::OK,
    };

    let mut response = (status, Json(outcome.quotes)).into_response();
    response.headers_mut().insert(
        DATA_SOURCE_HEADER,
        HeaderValue::from_static(outcome.status.as_str()),
    );
    Ok(response)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/quotes", get(get_quotes))
}
