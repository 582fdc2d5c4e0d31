use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use portfolio_dashboard_core::models::chat::ChatReply;
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default, alias = "conversationId")]
    conversation_id: Option<String>,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatReply>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let reply = state
        .dashboard
        .ask(&request.message, request.conversation_id.as_deref())
        .await?;
    Ok(Json(reply))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}
