use std::collections::HashSet;

use chrono::{DateTime, Utc};
use docnav_protocol::{StreamPayload, ToolCall};

use crate::conversation::TraceEntry;

/// Per-run tool-call trace with identity-based de-duplication.
///
/// `messages/partial` re-sends the full tool call list with every token, so
/// each call identity is recorded at most once per run.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    seen: HashSet<String>,
    entries: Vec<TraceEntry>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all entries and identities; called at the start of each run.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.entries.clear();
    }

    /// Record the tool calls in `payload`, returning the entries that were new.
    pub fn record(&mut self, payload: &StreamPayload) -> Vec<TraceEntry> {
        self.record_calls(&payload.tool_calls(), Utc::now())
    }

    pub fn record_calls(&mut self, calls: &[ToolCall], now: DateTime<Utc>) -> Vec<TraceEntry> {
        let mut added = Vec::new();
        for call in calls {
            if !self.seen.insert(call.identity()) {
                continue;
            }
            let entry = TraceEntry {
                tool: call.tool_name().to_string(),
                node_id: call.node_id(),
                timestamp: now,
            };
            tracing::debug!(tool = %entry.tool, node_id = %entry.node_id, "tool call traced");
            self.entries.push(entry.clone());
            added.push(entry);
        }
        added
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
