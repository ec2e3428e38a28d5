use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool invocation the agent made while answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub tool: String,
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Change notifications for views observing a [`crate::SessionClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    MessageAppended(ConversationMessage),
    MessageUpdated { id: Uuid, content: String },
    TraceRecorded(TraceEntry),
    /// A new run started; previously recorded entries no longer apply.
    TraceCleared,
    StreamingChanged(bool),
}
