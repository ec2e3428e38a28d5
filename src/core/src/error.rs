use std::net::SocketAddr;

use reqwest::StatusCode;
use thiserror::Error;

/// Thread or assistant resolution failed.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to create thread: {0}")]
    CreateThread(StatusCode),

    #[error("failed to create assistant: {0}")]
    CreateAssistant(StatusCode),

    #[error("failed to find assistant: {0}")]
    SearchAssistant(StatusCode),

    #[error("no assistant found for graph '{0}'")]
    NoAssistant(String),

    #[error("session request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// The run-stream request or its body failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("no response body")]
    MissingBody,

    #[error("run request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("stream read failed: {0}")]
    Stream(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid api url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("child command is empty")]
    EmptyCommand,

    #[error("invalid child command: {0}")]
    InvalidCommand(#[from] shell_words::ParseError),

    #[error("failed to bind health listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
