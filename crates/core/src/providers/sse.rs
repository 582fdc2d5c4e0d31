//! Accumulates a chat answer out of a server-sent event stream.
//!
//! The stream arrives as arbitrary byte chunks. Complete lines are fed through
//! a small state machine:
//!
//! ```text
//!   AwaitingEvent --data:--> InEvent --blank line--> AwaitingEvent
//!         |                     |
//!         +---- [DONE] / message_end / error ----> Done
//! ```
//!
//! Malformed payloads are counted and skipped, never fatal.

use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::models::chat::{ChatReply, ChatStreamEvent};

const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseState {
    /// Between events: no pending data.
    AwaitingEvent,
    /// At least one `data:` line of the current event has been seen.
    InEvent,
    /// Terminal. Further input is ignored.
    Done,
}

#[derive(Debug)]
pub struct SseAccumulator {
    state: SseState,
    /// Bytes of an incomplete trailing line.
    pending_line: Vec<u8>,
    /// `data:` payload of the current event.
    event_data: String,
    /// Value of the current event's `event:` field, if any.
    event_name: Option<String>,
    reply: ChatReply,
    skipped: usize,
    upstream_error: Option<String>,
}

impl SseAccumulator {
    pub fn new() -> Self {
        Self {
            state: SseState::AwaitingEvent,
            pending_line: Vec::new(),
            event_data: String::new(),
            event_name: None,
            reply: ChatReply::default(),
            skipped: 0,
            upstream_error: None,
        }
    }

    pub fn state(&self) -> SseState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == SseState::Done
    }

    /// Number of event payloads that could not be parsed.
    pub fn skipped_events(&self) -> usize {
        self.skipped
    }

    /// The answer accumulated so far.
    pub fn reply(&self) -> &ChatReply {
        &self.reply
    }

    /// Feed a chunk of the response body. Lines may be split across chunks,
    /// including in the middle of a multi-byte UTF-8 sequence.
    pub fn feed(&mut self, chunk: &[u8]) -> SseState {
        if self.is_done() {
            return self.state;
        }

        self.pending_line.extend_from_slice(chunk);
        while let Some(pos) = self.pending_line.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.pending_line.drain(..=pos).collect();
            let line = decode_line(&line_bytes[..line_bytes.len() - 1]);
            self.process_line(&line);
            if self.is_done() {
                self.pending_line.clear();
                break;
            }
        }
        self.state
    }

    /// End of stream: flush the trailing line and any pending event.
    pub fn finish(mut self) -> Result<ChatReply, CoreError> {
        if !self.is_done() && !self.pending_line.is_empty() {
            let rest = std::mem::take(&mut self.pending_line);
            let line = decode_line(&rest);
            self.process_line(&line);
        }
        if self.state == SseState::InEvent {
            self.dispatch();
        }

        if self.skipped > 0 {
            warn!("Skipped {} malformed chat stream events", self.skipped);
        }

        match self.upstream_error {
            Some(err) if self.reply.answer.is_empty() => Err(CoreError::Stream(err)),
            _ => Ok(self.reply),
        }
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            if self.state == SseState::InEvent {
                self.dispatch();
            }
            return;
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if value.trim() == DONE_MARKER {
                    debug!("Chat stream reported {DONE_MARKER}");
                    self.state = SseState::Done;
                    return;
                }
                if !self.event_data.is_empty() {
                    self.event_data.push('\n');
                }
                self.event_data.push_str(value);
                self.state = SseState::InEvent;
            }
            "event" => {
                self.event_name = Some(value.to_string());
            }
            // id, retry and unknown fields carry nothing we need
            _ => {}
        }
    }

    fn dispatch(&mut self) {
        let data = std::mem::take(&mut self.event_data);
        let sse_name = self.event_name.take();
        self.state = SseState::AwaitingEvent;

        match serde_json::from_str::<ChatStreamEvent>(&data) {
            Ok(event) => self.apply(event, sse_name),
            Err(_) if data.contains('\n') => {
                // Upstreams that omit the blank line between events send one
                // JSON document per data line.
                for line in data.lines() {
                    if self.is_done() {
                        break;
                    }
                    match serde_json::from_str::<ChatStreamEvent>(line) {
                        Ok(event) => self.apply(event, sse_name.clone()),
                        Err(e) => self.skip(line, &e),
                    }
                }
            }
            Err(e) => self.skip(&data, &e),
        }
    }

    fn skip(&mut self, payload: &str, err: &serde_json::Error) {
        self.skipped += 1;
        let preview: String = payload.chars().take(80).collect();
        debug!("Skipping malformed chat event ({err}): {preview}");
    }

    fn apply(&mut self, event: ChatStreamEvent, sse_name: Option<String>) {
        if self.reply.conversation_id.is_none() {
            self.reply.conversation_id = event.conversation_id.clone();
        }
        if self.reply.message_id.is_none() {
            self.reply.message_id = event.message_id.clone();
        }

        let name = if event.event.is_empty() {
            sse_name.unwrap_or_default()
        } else {
            event.event.clone()
        };

        match name.as_str() {
            "message" | "agent_message" => {
                if let Some(answer) = event.answer {
                    self.reply.answer.push_str(&answer);
                }
            }
            "message_end" => {
                debug!("Chat stream reported message_end");
                self.state = SseState::Done;
            }
            "error" => {
                let message = event
                    .message
                    .unwrap_or_else(|| "upstream reported an error".into());
                warn!("Chat stream error event: {message}");
                self.upstream_error = Some(message);
                self.state = SseState::Done;
            }
            other => debug!("Skipping chat event type: {other}"),
        }
    }
}

impl Default for SseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
