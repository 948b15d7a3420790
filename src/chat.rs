//! chat.rs
//!
//! Conversation state for the chat front-end: transcript, the three
//! follow-up suggestions on offer, and the response ID that chains the next
//! turn onto the provider-side conversation.

use std::fmt::{Display, Formatter};

use tracing::{debug, warn};

use crate::client::types::Reply;
use crate::client::{ApiError, Assistant};
use crate::config::ChatSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("You"),
            Role::Assistant => f.write_str("Assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: Reply,
    /// False when the suggestion request failed and the old ones were kept.
    pub suggestions_refreshed: bool,
}

#[derive(Debug)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    suggestions: [String; 3],
    previous_response_id: Option<String>,
}

impl ChatSession {
    pub fn new(settings: &ChatSettings) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: Role::Assistant,
                content: settings.welcome_message.clone(),
            }],
            suggestions: settings.initial_suggestions.clone(),
            previous_response_id: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn suggestions(&self) -> &[String; 3] {
        &self.suggestions
    }

    pub fn previous_response_id(&self) -> Option<&str> {
        self.previous_response_id.as_deref()
    }

    /// Run one turn. Blank input is ignored (`Ok(None)`).
    ///
    /// The transcript only changes once the reply has completed, so a failed
    /// or dropped turn leaves the session exactly as it was.
    pub async fn submit(
        &mut self,
        assistant: &dyn Assistant,
        input: &str,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<Option<TurnOutcome>, ApiError> {
        let query = input.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let reply = assistant
            .stream_reply(query, self.previous_response_id.as_deref(), on_delta)
            .await?;
        debug!(response = %reply.response_id, chars = reply.text.len(), "reply complete");

        self.messages.push(ChatMessage {
            role: Role::User,
            content: query.to_string(),
        });
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: reply.text.clone(),
        });
        self.previous_response_id = Some(reply.response_id.clone());

        let suggestions_refreshed = match assistant.suggestions(query).await {
            Ok(s) => {
                self.suggestions = s.into_array();
                true
            }
            Err(e) => {
                warn!(error = %e, "could not refresh suggestions; keeping previous ones");
                false
            }
        };

        Ok(Some(TurnOutcome {
            reply,
            suggestions_refreshed,
        }))
    }
}
