use std::sync::{Arc, Mutex, MutexGuard};

use docnav_protocol::{RunStreamRequest, StreamPayload};
use futures::StreamExt;
use reqwest::StatusCode;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::conversation::{ConversationEvent, ConversationMessage, TraceEntry};
use crate::error::{ClientError, TransportError};
use crate::fold::RunFold;
use crate::session::SessionBootstrap;
use crate::sse::decode_stream;
use crate::trace::TraceRecorder;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of [`SessionClient::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, or a run was already in flight.
    Ignored,
    Completed,
    /// The run failed; the description was appended as an error message.
    Failed(String),
}

#[derive(Debug, Default)]
struct ConversationState {
    messages: Vec<ConversationMessage>,
    trace: TraceRecorder,
    streaming: bool,
}

struct Inner {
    http: reqwest::Client,
    config: ClientConfig,
    bootstrap: SessionBootstrap,
    state: Mutex<ConversationState>,
    events: broadcast::Sender<ConversationEvent>,
}

/// Conversation with the document-navigation agent.
///
/// Clones share one conversation. At most one run is in flight at a time;
/// sends made while streaming are dropped, not queued.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        url::Url::parse(&config.api_url).map_err(|source| ClientError::InvalidUrl {
            url: config.api_url.clone(),
            source,
        })?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ClientError::HttpClient)?;
        let bootstrap = SessionBootstrap::new(http.clone(), &config.api_url, &config.graph_id);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                bootstrap,
                state: Mutex::new(ConversationState::default()),
                events,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionBootstrap {
        &self.inner.bootstrap
    }

    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.state().messages.clone()
    }

    /// Trace of the current (or most recent) run.
    pub fn traces(&self) -> Vec<TraceEntry> {
        self.state().trace.entries().to_vec()
    }

    pub fn is_streaming(&self) -> bool {
        self.state().streaming
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.inner.events.subscribe()
    }

    /// Send one user message and stream the agent's reply to completion.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }
        if !self.begin_run(text) {
            tracing::debug!("run already in flight; dropping send");
            return SendOutcome::Ignored;
        }

        let outcome = match self.drive_run(text).await {
            Ok(()) => SendOutcome::Completed,
            Err(err) => {
                let description = err.to_string();
                tracing::warn!(error = %description, "run failed");
                self.append_message(ConversationMessage::assistant(format!(
                    "Error: {description}"
                )));
                SendOutcome::Failed(description)
            }
        };

        self.state().streaming = false;
        self.emit(ConversationEvent::StreamingChanged(false));
        outcome
    }

    /// Guarded transition into streaming. Appends the user message and
    /// clears the previous run's trace.
    fn begin_run(&self, text: &str) -> bool {
        let user = ConversationMessage::user(text);
        {
            let mut state = self.state();
            if state.streaming {
                return false;
            }
            state.messages.push(user.clone());
            state.streaming = true;
            state.trace.reset();
        }
        self.emit(ConversationEvent::MessageAppended(user));
        self.emit(ConversationEvent::StreamingChanged(true));
        self.emit(ConversationEvent::TraceCleared);
        true
    }

    async fn drive_run(&self, text: &str) -> Result<(), ClientError> {
        let session = self.inner.bootstrap.ensure().await?;
        let request = RunStreamRequest::human(
            session.assistant_id,
            text,
            self.inner.config.stream_mode.clone(),
        );
        let url = self
            .inner
            .bootstrap
            .endpoint(&format!("threads/{}/runs/stream", session.thread_id));

        let response = self
            .inner
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(TransportError::Request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status).into());
        }
        if status == StatusCode::NO_CONTENT {
            return Err(TransportError::MissingBody.into());
        }

        let reply_id = self.append_message(ConversationMessage::assistant(""));
        let mut fold = RunFold::new();
        let records = decode_stream(response.bytes_stream());
        futures::pin_mut!(records);

        while let Some(record) = records.next().await {
            let record = record.map_err(TransportError::Stream)?;
            let payload = StreamPayload::classify(&record.event, &record.data);
            if let Some(content) = fold.apply(&payload) {
                self.update_message(reply_id, content);
            }
            self.record_trace(&payload);
        }

        if let Some(notice) = fold.finish() {
            self.update_message(reply_id, notice.to_string());
        }
        tracing::debug!(thread_id = %session.thread_id, "run stream completed");
        Ok(())
    }

    fn append_message(&self, message: ConversationMessage) -> Uuid {
        let id = message.id;
        self.state().messages.push(message.clone());
        self.emit(ConversationEvent::MessageAppended(message));
        id
    }

    fn update_message(&self, id: Uuid, content: String) {
        {
            let mut state = self.state();
            let Some(message) = state.messages.iter_mut().find(|m| m.id == id) else {
                return;
            };
            if message.content == content {
                return;
            }
            message.content = content.clone();
        }
        self.emit(ConversationEvent::MessageUpdated { id, content });
    }

    fn record_trace(&self, payload: &StreamPayload) {
        let added = self.state().trace.record(payload);
        for entry in added {
            self.emit(ConversationEvent::TraceRecorded(entry));
        }
    }

    fn emit(&self, event: ConversationEvent) {
        let _ = self.inner.events.send(event);
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
