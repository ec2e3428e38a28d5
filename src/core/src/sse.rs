use futures::{Stream, StreamExt};
use serde_json::Value;

/// `data:` payload marking the end of a stream; carries no record.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded `data:` line and the event type it arrived under.
#[derive(Debug, Clone, PartialEq)]
pub struct SseRecord {
    pub event: String,
    pub data: Value,
}

/// Incremental line-buffered decoder for SSE byte streams.
///
/// Chunks may split lines and multi-byte characters anywhere; the decoded
/// records do not depend on where the splits fall. Only newline-terminated
/// lines are processed, so content left in the buffer when the source ends
/// is never emitted.
#[derive(Debug, Default)]
pub struct EventDecoder {
    pending_bytes: Vec<u8>,
    line_buffer: String,
    event_type: String,
}

impl EventDecoder {
    /// Feed a chunk and drain the records completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseRecord> {
        self.decode_text(chunk);

        let mut records = Vec::new();
        let Some(last_newline) = self.line_buffer.rfind('\n') else {
            return records;
        };
        let rest = self.line_buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.line_buffer, rest);

        for line in complete[..complete.len() - 1].split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(record) = self.process_line(line) {
                records.push(record);
            }
        }
        records
    }

    /// Current event type; empty between events.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Whether an unterminated line or partial character is buffered.
    pub fn has_pending(&self) -> bool {
        !self.line_buffer.is_empty() || !self.pending_bytes.is_empty()
    }

    fn decode_text(&mut self, chunk: &[u8]) {
        self.pending_bytes.extend_from_slice(chunk);
        let input = std::mem::take(&mut self.pending_bytes);
        let mut consumed = 0;

        while consumed < input.len() {
            match std::str::from_utf8(&input[consumed..]) {
                Ok(text) => {
                    self.line_buffer.push_str(text);
                    consumed = input.len();
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.line_buffer
                        .push_str(&String::from_utf8_lossy(&input[consumed..consumed + valid]));
                    consumed += valid;
                    match err.error_len() {
                        Some(len) => {
                            self.line_buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed += len;
                        }
                        // Incomplete sequence at the end: wait for the next chunk.
                        None => break,
                    }
                }
            }
        }

        self.pending_bytes = input[consumed..].to_vec();
    }

    fn process_line(&mut self, line: &str) -> Option<SseRecord> {
        if line.is_empty() {
            self.event_type.clear();
            return None;
        }
        if let Some(value) = field_value(line, "event") {
            self.event_type = value.trim().to_string();
            return None;
        }
        let raw = field_value(line, "data")?;
        if raw == DONE_SENTINEL {
            return None;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(data) => Some(SseRecord {
                event: self.event_type.clone(),
                data,
            }),
            Err(err) => {
                tracing::debug!(
                    event = %self.event_type,
                    error = %err,
                    "dropping malformed sse data payload"
                );
                None
            }
        }
    }
}

/// Value of an SSE field line: `name:` followed by one optional space.
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Adapt a byte-chunk stream into a lazy stream of decoded records.
///
/// The first transport error is yielded and ends the stream.
pub fn decode_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseRecord, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let state = (Box::pin(bytes), EventDecoder::default(), false);
    futures::stream::unfold(state, |(mut bytes, mut decoder, failed)| async move {
        if failed {
            return None;
        }
        let (batch, failed) = match bytes.next().await? {
            Ok(chunk) => (
                decoder
                    .feed(chunk.as_ref())
                    .into_iter()
                    .map(Ok)
                    .collect::<Vec<_>>(),
                false,
            ),
            Err(err) => (vec![Err(err)], true),
        };
        Some((futures::stream::iter(batch), (bytes, decoder, failed)))
    })
    .flatten()
}
