use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::sse::{SseAccumulator, SseState};
use super::traits::ChatProvider;
use crate::errors::CoreError;
use crate::models::chat::ChatReply;

pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";
const PROVIDER: &str = "Dify";

/// Dify chat provider in streaming response mode.
///
/// - **Requires**: API key (settings key "dify"), sent as a bearer token.
/// - **Streaming**: the body is an SSE stream read chunk by chunk into an
///   [`SseAccumulator`] until `[DONE]`, `message_end` or end of body.
pub struct DifyProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    user: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    inputs: serde_json::Value,
    query: &'a str,
    response_mode: &'static str,
    user: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
}

impl DifyProvider {
    pub fn new(api_key: Option<String>, user: impl Into<String>) -> Self {
        Self::with_base_url(api_key, user, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: Option<String>,
        user: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
        }
    }

    /// Send a message, optionally continuing an existing conversation.
    pub async fn ask_in_conversation(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply, CoreError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CoreError::Config("Dify API key is not configured".into()))?;

        let body = ChatRequest {
            inputs: serde_json::json!({}),
            query: message,
            response_mode: "streaming",
            user: &self.user,
            conversation_id,
        };

        let response = self
            .client
            .post(format!("{}/chat-messages", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            warn!("{PROVIDER} returned {status}: {details}");
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Chat request failed with status {status}"),
            });
        }

        debug!(
            "{PROVIDER} stream opened (content-type: {:?})",
            response.headers().get(reqwest::header::CONTENT_TYPE)
        );

        let mut accumulator = SseAccumulator::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CoreError::Stream(format!("{PROVIDER} stream: {e}")))?;
            if accumulator.feed(&chunk) == SseState::Done {
                break;
            }
        }

        let reply = accumulator.finish()?;
        info!(
            "{PROVIDER} answered with {} characters (conversation {:?})",
            reply.answer.chars().count(),
            reply.conversation_id
        );
        Ok(reply)
    }
}

#[async_trait]
impl ChatProvider for DifyProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn ask(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply, CoreError> {
        self.ask_in_conversation(message, conversation_id).await
    }
}
