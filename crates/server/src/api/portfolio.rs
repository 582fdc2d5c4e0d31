use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use portfolio_dashboard_core::models::portfolio::DashboardState;

use crate::main_lib::AppState;

/// Latest published dashboard state. Never fails: before the first tick the
/// state is simply empty.
async fn get_portfolio(State(state): State<Arc<AppState>>) -> Json<DashboardState> {
    Json(state.dashboard.current_state())
}

/// Run one refresh cycle now.
async fn refresh_portfolio(State(state): State<Arc<AppState>>) -> Json<DashboardState> {
    Json(state.dashboard.refresh().await)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/portfolio", get(get_portfolio))
        .route("/portfolio/refresh", post(refresh_portfolio))
}
