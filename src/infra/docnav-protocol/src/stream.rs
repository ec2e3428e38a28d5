use serde::Deserialize;
use serde_json::Value;

use crate::ProtocolError;

/// SSE event type carrying a cumulative message snapshot.
pub const PARTIAL_MESSAGE_EVENT: &str = "messages/partial";

/// One decoded run-stream payload, classified by shape.
///
/// The backend reports assistant output either as cumulative
/// `messages/partial` snapshots or as bare delta objects. Classification is
/// per event; anything else is `Unrecognized` and ignored by consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    PartialMessage(PartialMessage),
    LegacyDelta(LegacyDelta),
    Unrecognized,
}

impl StreamPayload {
    /// Classify a decoded `data:` payload using the event type it arrived under.
    pub fn classify(event: &str, data: &Value) -> Self {
        if event == PARTIAL_MESSAGE_EVENT {
            return match PartialMessage::from_payload(data) {
                Ok(message) => Self::PartialMessage(message),
                Err(_) => Self::Unrecognized,
            };
        }
        match LegacyDelta::from_payload(data) {
            Some(delta) => Self::LegacyDelta(delta),
            None => Self::Unrecognized,
        }
    }

    /// Tool invocations carried by this payload, in wire order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        match self {
            Self::PartialMessage(message) => message.tool_calls().to_vec(),
            Self::LegacyDelta(delta) => delta.tool_call().into_iter().collect(),
            Self::Unrecognized => Vec::new(),
        }
    }
}

/// The first message of a `messages/partial` sequence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PartialMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl PartialMessage {
    /// Extract the leading message from a `messages/partial` payload.
    pub fn from_payload(data: &Value) -> Result<Self, ProtocolError> {
        let items = match data {
            Value::Array(items) => items,
            Value::Object(_) => return Err(ProtocolError::NotASequence("object")),
            Value::String(_) => return Err(ProtocolError::NotASequence("string")),
            _ => return Err(ProtocolError::NotASequence("scalar")),
        };
        let first = items.first().ok_or(ProtocolError::EmptySequence)?;
        Ok(Self::deserialize(first)?)
    }

    /// Whether the message was authored by the agent (as opposed to a
    /// human or tool message echoed back).
    pub fn is_agent_output(&self) -> bool {
        matches!(self.kind.as_str(), "ai" | "AIMessageChunk")
    }

    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// Message content: plain text, or a list of typed content blocks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<Value>),
    Other(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl MessageContent {
    /// Concatenated text. Non-text blocks are skipped.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect(),
            Self::Other(_) => String::new(),
        }
    }
}

/// A tool invocation reported by the agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Value,
}

/// Argument keys checked, in order, for the visited node.
const NODE_ID_KEYS: &[&str] = &["node_id", "doc_id", "nodeId"];

impl ToolCall {
    /// Identity used for de-duplication within a run: the explicit call id
    /// when present, else `name-<canonical args>`.
    pub fn identity(&self) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!(
                "{}-{}",
                self.name.as_deref().unwrap_or_default(),
                canonical_json(&self.args)
            ),
        }
    }

    pub fn tool_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "unknown",
        }
    }

    /// The node or document the call targets, or an empty string.
    pub fn node_id(&self) -> String {
        for key in NODE_ID_KEYS {
            if let Some(id) = self.args.get(key).and_then(non_empty_str) {
                return id.to_string();
            }
        }
        self.args
            .get("node_ids")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(non_empty_str)
            .unwrap_or_default()
            .to_string()
    }
}

/// A bare delta object sent without the `messages/partial` envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegacyDelta {
    pub kind: Option<String>,
    pub token: Option<String>,
    pub content: Option<String>,
    pub tool: Option<String>,
    pub name: Option<String>,
    pub args: Value,
    pub node_id: Option<String>,
}

impl LegacyDelta {
    /// Structural check: an object carrying at least a text delta or a tool name.
    pub fn from_payload(data: &Value) -> Option<Self> {
        let obj = data.as_object()?;
        let field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        let delta = Self {
            kind: field("type"),
            token: field("token"),
            content: field("content"),
            tool: field("tool"),
            name: field("name"),
            args: obj.get("args").cloned().unwrap_or(Value::Null),
            node_id: field("nodeId"),
        };
        if delta.token.is_none()
            && delta.content.is_none()
            && delta.tool.is_none()
            && delta.name.is_none()
        {
            return None;
        }
        Some(delta)
    }

    /// Text to append to the running reply; `token` wins over `content`.
    /// Tool reports carry no reply text.
    pub fn delta_text(&self) -> Option<&str> {
        if self.is_tool_report() {
            return None;
        }
        self.token.as_deref().or(self.content.as_deref())
    }

    pub fn is_tool_report(&self) -> bool {
        matches!(self.kind.as_deref(), Some("tool" | "tool_call"))
    }

    /// The tool invocation this delta reports, if any.
    pub fn tool_call(&self) -> Option<ToolCall> {
        let name = self.tool.clone().or_else(|| self.name.clone())?;
        let mut args = self.args.clone();
        if let Some(node_id) = self.node_id.as_deref().filter(|id| !id.is_empty()) {
            match &mut args {
                Value::Object(map) => {
                    map.entry("nodeId")
                        .or_insert_with(|| Value::String(node_id.to_string()));
                }
                Value::Null => {
                    args = serde_json::json!({ "nodeId": node_id });
                }
                _ => {}
            }
        }
        Some(ToolCall {
            id: None,
            name: Some(name),
            args,
        })
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
