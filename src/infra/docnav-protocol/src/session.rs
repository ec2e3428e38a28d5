use serde::{Deserialize, Serialize};

/// Default `stream_mode` requested for runs.
pub const DEFAULT_STREAM_MODE: &str = "messages";

/// Response body of `POST /threads`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadCreated {
    pub thread_id: String,
}

/// Request body of `POST /assistants` and `POST /assistants/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantQuery {
    pub graph_id: String,
}

impl AssistantQuery {
    pub fn new(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
        }
    }
}

/// An assistant record as returned by create and search.
///
/// Only `assistant_id` is required; the backend sends more fields than the
/// client reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantRecord {
    pub assistant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
}

/// Request body of `POST /threads/{thread_id}/runs/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStreamRequest {
    pub assistant_id: String,
    pub input: RunInput,
    pub stream_mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInput {
    pub messages: Vec<InputMessage>,
}

/// A message submitted as run input. `type` is `"human"` for user text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl InputMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            kind: "human".to_string(),
            content: content.into(),
        }
    }
}

impl RunStreamRequest {
    /// Build a run request carrying a single human message.
    pub fn human(
        assistant_id: impl Into<String>,
        content: impl Into<String>,
        stream_mode: impl Into<String>,
    ) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            input: RunInput {
                messages: vec![InputMessage::human(content)],
            },
            stream_mode: stream_mode.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_request_serializes_human_message_shape() {
        let req = RunStreamRequest::human("a1", "where is the install guide?", DEFAULT_STREAM_MODE);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "assistant_id": "a1",
                "input": { "messages": [{ "type": "human", "content": "where is the install guide?" }] },
                "stream_mode": "messages",
            })
        );
    }

    #[test]
    fn assistant_record_ignores_unknown_fields() {
        let raw = r#"{"assistant_id":"A1","graph_id":"docnav","metadata":{},"version":3}"#;
        let record: AssistantRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.assistant_id, "A1");
        assert_eq!(record.graph_id.as_deref(), Some("docnav"));
    }

    #[test]
    fn assistant_record_without_graph_id() {
        let record: AssistantRecord = serde_json::from_str(r#"{"assistant_id":"A2"}"#).unwrap();
        assert!(record.graph_id.is_none());
        let encoded = serde_json::to_string(&record).unwrap();
        assert!(!encoded.contains("graph_id"));
    }
}
