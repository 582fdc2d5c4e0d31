use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use portfolio_dashboard_core::models::holding::parse_symbol_list;
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

pub const CACHE_USED_HEADER: &str = "x-cache-used";
pub const EARNINGS_CACHE_HEADER: &str = "x-earnings-cache";

#[derive(Deserialize)]
struct FundamentalsQuery {
    symbols: Option<String>,
}

async fn get_fundamentals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FundamentalsQuery>,
) -> ApiResult<Response> {
    let raw = query
        .symbols
        .ok_or_else(|| ApiError::BadRequest("Symbols parameter is required".into()))?;

    let outcome = state
        .dashboard
        .get_fundamentals(&parse_symbol_list(&raw))
        .await?;

    let mut response = Json(outcome.results).into_response();
    let headers = response.headers_mut();
    headers.insert(
        CACHE_USED_HEADER,
        HeaderValue::from_static(outcome.cache_usage.as_str()),
    );
    headers.insert(
        EARNINGS_CACHE_HEADER,
        HeaderValue::from_static(outcome.earnings_cache.as_str()),
    );
    Ok(response)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/fundamentals", get(get_fundamentals))
}
