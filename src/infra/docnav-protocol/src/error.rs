use thiserror::Error;

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("expected a message sequence, got {0}")]
    NotASequence(&'static str),

    #[error("message sequence is empty")]
    EmptySequence,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
