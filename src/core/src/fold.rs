use docnav_protocol::StreamPayload;

/// Reply text shown when a run finishes without producing any.
pub const NO_RESPONSE_NOTICE: &str = "(no response generated)";

/// Folds stream payloads into the assistant reply of one run.
///
/// Partial-message content is cumulative and replaces the reply; legacy
/// deltas append to an accumulator that then replaces the reply.
#[derive(Debug, Default)]
pub struct RunFold {
    accumulated: String,
    saw_partial: bool,
}

impl RunFold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one payload. Returns the new reply content when it changed.
    pub fn apply(&mut self, payload: &StreamPayload) -> Option<String> {
        match payload {
            StreamPayload::PartialMessage(message) => {
                self.saw_partial = true;
                if !message.is_agent_output() {
                    return None;
                }
                let text = message.text();
                if text.is_empty() {
                    return None;
                }
                Some(text)
            }
            StreamPayload::LegacyDelta(delta) => {
                let text = delta.delta_text().filter(|text| !text.is_empty())?;
                self.accumulated.push_str(text);
                Some(self.accumulated.clone())
            }
            StreamPayload::Unrecognized => None,
        }
    }

    /// Content to write once the stream has ended, if any.
    pub fn finish(&self) -> Option<&'static str> {
        if !self.saw_partial && self.accumulated.is_empty() {
            Some(NO_RESPONSE_NOTICE)
        } else {
            None
        }
    }
}
