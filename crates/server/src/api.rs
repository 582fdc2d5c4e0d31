mod chat;
mod fundamentals;
mod health;
mod portfolio;
mod quotes;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{config::Config, main_lib::AppState};

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {o:?}");
                    None
                }
            })
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };
    let cors = cors.allow_methods(Any).allow_headers(Any).expose_headers(Any);

    let api = Router::new()
        .merge(health::router())
        .merge(quotes::router())
        .merge(fundamentals::router())
        .merge(chat::router())
        .merge(portfolio::router());

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
