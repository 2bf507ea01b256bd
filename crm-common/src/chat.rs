//! AI sales assistant: streaming chat consumer
//!
//! The assistant endpoint answers a server-sent event stream of
//! `data: {json}` lines, each carrying an incremental delta at
//! `choices[0].delta.content`, terminated by `data: [DONE]`.
//!
//! Network chunks split the stream at arbitrary byte offsets: in the middle
//! of a line, of a JSON object or of a multi-byte character. [`StreamDecoder`]
//! buffers raw bytes and only decodes complete lines, so the reassembled
//! text never depends on where the chunks were cut.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Failures talking to the assistant endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// HTTP 429
    #[error("Rate limit exceeded. Please wait a moment and try again.")]
    RateLimited,

    /// HTTP 402
    #[error("AI credits exhausted. Please add credits to continue.")]
    QuotaExhausted,

    #[error("Chat request failed ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Chat transport error: {0}")]
    Transport(String),

    /// Stream ended without producing any assistant text
    #[error("Assistant returned an empty response")]
    EmptyResponse,
}

impl ChatError {
    /// Map a non-success status and its body to the matching error
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => ChatError::RateLimited,
            402 => ChatError::QuotaExhausted,
            _ => {
                let message = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| {
                        if body.trim().is_empty() {
                            "Failed to get a response".to_string()
                        } else {
                            body.trim().to_string()
                        }
                    });
                ChatError::Http { status, message }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered message history sent with every request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Grow the trailing assistant message, starting one if the last message is the user's
    pub fn append_assistant_delta(&mut self, delta: &str) {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content.push_str(delta),
            _ => self.messages.push(ChatMessage::assistant(delta)),
        }
    }
}

/// Incremental decoder for the assistant's event stream
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    /// Payload that failed to parse, retried once joined with the next line
    pending: Option<String>,
    done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `[DONE]` has been seen; later input is ignored
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one network chunk; returns the deltas completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.decode_line(line.trim_end_matches('\r'), &mut deltas);
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        deltas
    }

    /// Flush a final line that arrived without a trailing newline
    pub fn finish(&mut self) -> Vec<String> {
        let mut deltas = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.decode_line(line.trim_end_matches('\r'), &mut deltas);
        }
        if let Some(dropped) = self.pending.take() {
            warn!(fragment = %dropped, "Dropping unparsable stream fragment");
        }
        deltas
    }

    fn decode_line(&mut self, line: &str, deltas: &mut Vec<String>) {
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            debug!(line = %line, "Ignoring non-data stream line");
            return;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        if payload.trim() == DONE_MARKER {
            if let Some(dropped) = self.pending.take() {
                warn!(fragment = %dropped, "Dropping unparsable stream fragment");
            }
            self.done = true;
            return;
        }

        if let Some(previous) = self.pending.take() {
            let joined = format!("{}{}", previous, payload);
            match parse_delta(&joined) {
                Some(delta) => {
                    deltas.extend(delta);
                    return;
                }
                None => warn!(fragment = %previous, "Dropping unparsable stream fragment"),
            }
        }

        match parse_delta(payload) {
            Some(delta) => deltas.extend(delta),
            None => self.pending = Some(payload.to_string()),
        }
    }
}

/// `None` when the payload is not JSON; `Some(None)` when it carries no text
fn parse_delta(payload: &str) -> Option<Option<String>> {
    let value: Value = serde_json::from_str(payload).ok()?;
    Some(
        value
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    )
}

/// Client for the assistant's streaming endpoint
#[derive(Clone)]
pub struct ChatClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(endpoint: &str) -> Result<Self, ChatError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the conversation and stream the reply
    ///
    /// `on_delta` runs for each text fragment in arrival order. Returns the
    /// full assistant text; a stream with no text is `EmptyResponse`.
    pub async fn stream<F>(
        &self,
        conversation: &Conversation,
        access_token: &str,
        mut on_delta: F,
    ) -> Result<String, ChatError>
    where
        F: FnMut(&str),
    {
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "messages": conversation.messages }))
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::from_status(status.as_u16(), &body));
        }

        let mut decoder = StreamDecoder::new();
        let mut full_text = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ChatError::Transport(e.to_string()))?;
            for delta in decoder.push(&chunk) {
                on_delta(&delta);
                full_text.push_str(&delta);
            }
            if decoder.is_done() {
                break;
            }
        }
        for delta in decoder.finish() {
            on_delta(&delta);
            full_text.push_str(&delta);
        }

        if full_text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        Ok(full_text)
    }
}
