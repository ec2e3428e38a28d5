use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::config::ClientConfig;
use crate::paths::docnav_config_path;

/// Contents of `~/.docnav/config.toml`. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocnavSettings {
    pub version: u32,
    pub client: ClientSettings,
}

impl Default for DocnavSettings {
    fn default() -> Self {
        Self {
            version: 1,
            client: ClientSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_url: Option<String>,
    pub graph_id: Option<String>,
    pub stream_mode: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

impl DocnavSettings {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&docnav_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| format!("read config.toml: {e}"))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| format!("parse config.toml: {e}"))
    }

    pub fn config_path() -> Result<PathBuf, String> {
        docnav_config_path()
    }

    /// Overlay the file's client settings on `config`.
    pub fn apply(&self, config: &mut ClientConfig) {
        let client = &self.client;
        if let Some(url) = non_empty(client.api_url.as_deref()) {
            config.api_url = url.to_string();
        }
        if let Some(graph) = non_empty(client.graph_id.as_deref()) {
            config.graph_id = graph.to_string();
        }
        if let Some(mode) = non_empty(client.stream_mode.as_deref()) {
            config.stream_mode = mode.to_string();
        }
        if let Some(secs) = client.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
