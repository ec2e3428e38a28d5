use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use docnav_protocol::{DEFAULT_SERVICE_NAME, DEFAULT_STREAM_MODE};

use crate::error::SupervisorError;

/// Session client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the agent runtime API (default: http://127.0.0.1:8000).
    pub api_url: String,
    /// Graph the assistant is created for.
    pub graph_id: String,
    /// `stream_mode` sent with each run.
    pub stream_mode: String,
    /// Connect timeout for API requests. Streams themselves are unbounded.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            graph_id: "docnav".to_string(),
            stream_mode: DEFAULT_STREAM_MODE.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Process supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Bind address of the health listener (default: 0.0.0.0:3002).
    pub health_bind: SocketAddr,
    /// Port handed to the child as `PORT`.
    pub child_port: u16,
    /// Data-source kind handed to the child as `DOCS_SOURCE`.
    pub docs_source: String,
    /// Data path handed to the child as `DOCS_PATH`.
    pub docs_path: PathBuf,
    /// Program and arguments of the child.
    pub command: Vec<String>,
    /// Working directory of the child; inherits ours when unset.
    pub working_dir: Option<PathBuf>,
    /// Exact stdout line the child prints once it is serving.
    pub ready_marker: String,
    /// Substrings of stdout lines also taken as readiness.
    pub ready_keywords: Vec<String>,
    /// Mark ready after this long regardless of output.
    pub startup_grace: Duration,
    /// Service name reported by `/health`.
    pub service_name: String,
}

pub const DEFAULT_CHILD_COMMAND: &str = "npx doctree-mcp --transport http";
pub const DEFAULT_READY_MARKER: &str = "DOCTREE_READY";
pub const DEFAULT_READY_KEYWORDS: &[&str] = &["listening", "started", "ready"];

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3002),
            child_port: 3001,
            docs_source: "filesystem".to_string(),
            docs_path: PathBuf::from("docs"),
            command: DEFAULT_CHILD_COMMAND
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            working_dir: None,
            ready_marker: DEFAULT_READY_MARKER.to_string(),
            ready_keywords: DEFAULT_READY_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            startup_grace: Duration::from_secs(5),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl SupervisorConfig {
    /// Split a shell-style command line into program and arguments.
    pub fn parse_command(raw: &str) -> Result<Vec<String>, SupervisorError> {
        let words = shell_words::split(raw)?;
        if words.is_empty() {
            return Err(SupervisorError::EmptyCommand);
        }
        Ok(words)
    }

    /// Variables injected into the child environment on top of ours.
    pub fn child_env(&self) -> Vec<(String, String)> {
        vec![
            ("DOCS_SOURCE".to_string(), self.docs_source.clone()),
            (
                "DOCS_PATH".to_string(),
                self.docs_path.to_string_lossy().into_owned(),
            ),
            ("PORT".to_string(), self.child_port.to_string()),
        ]
    }
}
