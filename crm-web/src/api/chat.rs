//! Assistant relay over Server-Sent Events
//!
//! The browser posts the conversation; the reply is streamed back as
//! `delta` events in arrival order, then one `done` (full text) or
//! `error` event.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use crm_common::chat::{ChatError, ChatMessage, Conversation};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::auth::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Relay events, one per SSE message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatEvent {
    Delta { content: String },
    Done { content: String },
    Error { code: u16, message: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::Delta { .. } => "delta",
            ChatEvent::Done { .. } => "done",
            ChatEvent::Error { .. } => "error",
        }
    }

    fn is_final(&self) -> bool {
        !matches!(self, ChatEvent::Delta { .. })
    }

    pub fn from_error(error: &ChatError) -> Self {
        let code = match error {
            ChatError::RateLimited => 429,
            ChatError::QuotaExhausted => 402,
            ChatError::Http { status, .. } => *status,
            ChatError::Transport(_) | ChatError::EmptyResponse => 502,
        };
        ChatEvent::Error {
            code,
            message: error.to_string(),
        }
    }
}

/// POST /api/chat
pub async fn chat_stream(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let client = state
        .chat
        .clone()
        .ok_or_else(|| ApiError::Unavailable("Assistant endpoint is not configured".to_string()))?;
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("Conversation is empty".to_string()));
    }

    let conversation = Conversation {
        messages: request.messages,
    };
    info!(user = %ctx.user.user.id, messages = conversation.messages.len(), "Assistant request");

    let (tx, mut rx) = mpsc::unbounded_channel::<ChatEvent>();
    let token = ctx.access_token.clone();
    tokio::spawn(async move {
        let delta_tx = tx.clone();
        let result = client
            .stream(&conversation, &token, |delta| {
                // Receiver gone means the browser disconnected
                let _ = delta_tx.send(ChatEvent::Delta {
                    content: delta.to_string(),
                });
            })
            .await;
        let last = match result {
            Ok(content) => ChatEvent::Done { content },
            Err(e) => {
                warn!(error = %e, "Assistant stream failed");
                ChatEvent::from_error(&e)
            }
        };
        let _ = tx.send(last);
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let event_type = event.event_type();
            let last = event.is_final();
            match serde_json::to_string(&event) {
                Ok(data) => yield Ok(Event::default().event(event_type).data(data)),
                Err(e) => warn!("SSE: Failed to serialize {} event: {}", event_type, e),
            }
            if last {
                debug!("SSE: Assistant stream closed");
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}
