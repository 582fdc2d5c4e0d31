use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::models::chat::ChatReply;
use crate::providers::traits::ChatProvider;

/// Relays one question to the chat provider and returns the accumulated answer.
pub struct ChatService {
    provider: Arc<dyn ChatProvider>,
}

impl ChatService {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    pub async fn ask(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply, CoreError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(CoreError::Validation("Message is required".into()));
        }
        let conversation_id = conversation_id.map(str::trim).filter(|c| !c.is_empty());

        debug!(
            "Forwarding chat message to {} ({} chars)",
            self.provider.name(),
            message.len()
        );
        self.provider
            .ask(message, conversation_id)
            .await
            .inspect_err(|e| warn!("{} chat request failed: {e}", self.provider.name()))
    }
}
