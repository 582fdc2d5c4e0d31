use serde::{Deserialize, Serialize};

/// The full answer accumulated from a streamed chat response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// One JSON payload of the upstream server-sent event stream.
///
/// Only the fields the accumulator needs; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
