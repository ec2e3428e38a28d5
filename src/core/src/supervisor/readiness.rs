use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::SupervisorConfig;

/// What flipped the supervisor to ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySource {
    Marker,
    Keyword,
    GraceTimer,
}

/// Monotonic `STARTING -> READY` flag shared by the output reader, the
/// grace timer and the health handler.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Returns true only for the call that performed the transition.
    pub fn mark_ready(&self, source: ReadySource) -> bool {
        let flipped = self
            .ready
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if flipped {
            tracing::info!(?source, "doctree-mcp ready");
        }
        flipped
    }
}

/// Recognizes readiness in child stdout lines.
#[derive(Debug, Clone)]
pub struct ReadinessMatcher {
    marker: String,
    keywords: Vec<String>,
}

impl ReadinessMatcher {
    pub fn new(marker: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            marker: marker.into(),
            keywords: keywords.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }

    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.ready_marker.clone(), config.ready_keywords.clone())
    }

    pub fn classify(&self, line: &str) -> Option<ReadySource> {
        if !self.marker.is_empty() && line.trim() == self.marker {
            return Some(ReadySource::Marker);
        }
        if self.keywords.iter().any(|k| line.contains(k.as_str())) {
            return Some(ReadySource::Keyword);
        }
        None
    }
}

/// Mark ready once `grace` elapses, whatever the child printed.
pub fn spawn_grace_timer(readiness: Readiness, grace: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        readiness.mark_ready(ReadySource::GraceTimer);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> ReadinessMatcher {
        ReadinessMatcher::from_config(&SupervisorConfig::default())
    }

    #[test]
    fn marker_line_is_structured_signal() {
        assert_eq!(matcher().classify("DOCTREE_READY"), Some(ReadySource::Marker));
        assert_eq!(matcher().classify("  DOCTREE_READY\r"), Some(ReadySource::Marker));
    }

    #[test]
    fn keywords_match_substrings() {
        assert_eq!(
            matcher().classify("doctree-mcp listening on :3001"),
            Some(ReadySource::Keyword)
        );
        assert_eq!(matcher().classify("server started"), Some(ReadySource::Keyword));
        assert_eq!(matcher().classify("loading 42 documents"), None);
    }

    #[test]
    fn empty_keywords_never_match() {
        let matcher = ReadinessMatcher::new("", vec![String::new()]);
        assert_eq!(matcher.classify("anything"), None);
        assert_eq!(matcher.classify(""), None);
    }

    #[test]
    fn ready_flips_once_and_never_reverts() {
        let readiness = Readiness::new();
        assert!(!readiness.is_ready());
        assert!(readiness.mark_ready(ReadySource::Keyword));
        assert!(!readiness.mark_ready(ReadySource::GraceTimer));
        assert!(readiness.clone().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn grace_timer_marks_ready_after_delay() {
        let readiness = Readiness::new();
        let timer = spawn_grace_timer(readiness.clone(), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!readiness.is_ready());
        tokio::time::sleep(Duration::from_secs(2)).await;
        timer.await.unwrap();
        assert!(readiness.is_ready());
    }
}
