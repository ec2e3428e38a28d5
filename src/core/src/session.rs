use docnav_protocol::{AssistantQuery, AssistantRecord, ThreadCreated};
use reqwest::StatusCode;
use tokio::sync::Mutex;

use crate::error::BootstrapError;

/// Backend identifiers a run is issued against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub thread_id: String,
    pub assistant_id: String,
}

/// Lazily resolves and caches the thread and assistant for one client.
///
/// Each identifier is fetched at most once; the lock is held across the
/// request so concurrent callers share a single round trip.
#[derive(Debug)]
pub struct SessionBootstrap {
    http: reqwest::Client,
    api_url: String,
    graph_id: String,
    thread_id: Mutex<Option<String>>,
    assistant_id: Mutex<Option<String>>,
}

impl SessionBootstrap {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>, graph_id: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            api_url,
            graph_id: graph_id.into(),
            thread_id: Mutex::new(None),
            assistant_id: Mutex::new(None),
        }
    }

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    /// Resolve both identifiers, thread first.
    pub async fn ensure(&self) -> Result<SessionHandle, BootstrapError> {
        let thread_id = self.ensure_thread().await?;
        let assistant_id = self.ensure_assistant().await?;
        Ok(SessionHandle {
            thread_id,
            assistant_id,
        })
    }

    pub async fn ensure_thread(&self) -> Result<String, BootstrapError> {
        let mut cached = self.thread_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let response = self
            .http
            .post(self.endpoint("threads"))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::CreateThread(status));
        }
        let created: ThreadCreated = response.json().await?;
        tracing::debug!(thread_id = %created.thread_id, "thread created");

        *cached = Some(created.thread_id.clone());
        Ok(created.thread_id)
    }

    /// Create the assistant for the graph, or adopt the existing one when
    /// the backend answers 409.
    pub async fn ensure_assistant(&self) -> Result<String, BootstrapError> {
        let mut cached = self.assistant_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let query = AssistantQuery::new(self.graph_id.clone());
        let response = self
            .http
            .post(self.endpoint("assistants"))
            .json(&query)
            .send()
            .await?;
        let status = response.status();

        let assistant_id = if status == StatusCode::CONFLICT {
            tracing::debug!(graph_id = %self.graph_id, "assistant exists; searching");
            self.search_assistant(&query).await?
        } else if status.is_success() {
            response.json::<AssistantRecord>().await?.assistant_id
        } else {
            return Err(BootstrapError::CreateAssistant(status));
        };
        tracing::debug!(%assistant_id, graph_id = %self.graph_id, "assistant resolved");

        *cached = Some(assistant_id.clone());
        Ok(assistant_id)
    }

    async fn search_assistant(&self, query: &AssistantQuery) -> Result<String, BootstrapError> {
        let response = self
            .http
            .post(self.endpoint("assistants/search"))
            .json(query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::SearchAssistant(status));
        }
        let records: Vec<AssistantRecord> = response.json().await?;
        records
            .into_iter()
            .next()
            .map(|record| record.assistant_id)
            .ok_or_else(|| BootstrapError::NoAssistant(self.graph_id.clone()))
    }

    /// Cached identifiers, if both have been resolved.
    pub async fn handle(&self) -> Option<SessionHandle> {
        let thread_id = self.thread_id.lock().await.clone()?;
        let assistant_id = self.assistant_id.lock().await.clone()?;
        Some(SessionHandle {
            thread_id,
            assistant_id,
        })
    }

    /// Drop cached identifiers; the next run bootstraps again.
    pub async fn reset(&self) {
        *self.thread_id.lock().await = None;
        *self.assistant_id.lock().await = None;
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }
}
