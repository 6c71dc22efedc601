//! Diagnostic Sink
//!
//! Ingestion reports skipped records and progress through this trait so that
//! the same reader runs against real logging, nothing at all, or an
//! in-memory recorder that tests can inspect.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Trait for receiving ingestion diagnostics
pub trait DiagnosticSink: Send + Sync + 'static {
    /// A record was rejected and skipped. `line` is 1-based, 0 when unknown.
    fn record_skipped(&self, line: u64, reason: &str);

    /// `parsed` records have been read so far
    fn record_progress(&self, _parsed: u64) {}
}

/// Sink that forwards diagnostics to `tracing`
#[derive(Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record_skipped(&self, line: u64, reason: &str) {
        warn!(line, reason, "Skipping record");
    }

    fn record_progress(&self, parsed: u64) {
        if parsed % 1_000_000 == 0 {
            info!("Parsed {}M records.", parsed / 1_000_000);
        }
    }
}

/// Sink that drops everything
#[derive(Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    #[inline]
    fn record_skipped(&self, _line: u64, _reason: &str) {}
}

/// One recorded diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub line: u64,
    pub reason: String,
}

/// Sink that keeps every diagnostic in memory
#[derive(Default)]
pub struct RecordingSink {
    skipped: Mutex<Vec<DiagnosticEvent>>,
    progress: AtomicU64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all skipped-record events
    pub fn skipped(&self) -> Vec<DiagnosticEvent> {
        self.skipped.lock().clone()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.lock().len()
    }

    /// Highest progress value reported
    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.skipped.lock().clear();
        self.progress.store(0, Ordering::SeqCst);
    }
}

impl DiagnosticSink for RecordingSink {
    fn record_skipped(&self, line: u64, reason: &str) {
        self.skipped.lock().push(DiagnosticEvent {
            line,
            reason: reason.to_string(),
        });
    }

    fn record_progress(&self, parsed: u64) {
        self.progress.fetch_max(parsed, Ordering::SeqCst);
    }
}

/// Arc wrapper for trait object usage
pub type SharedSink = Arc<dyn DiagnosticSink>;

pub fn tracing_sink() -> SharedSink {
    Arc::new(TracingSink)
}

pub fn noop_sink() -> SharedSink {
    Arc::new(NoopSink)
}

/// Create a recording sink for tests
pub fn recording_sink() -> Arc<RecordingSink> {
    Arc::new(RecordingSink::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_records() {
        let sink = RecordingSink::new();

        sink.record_skipped(3, "expected 9 but got 2 CSV fields");
        sink.record_skipped(7, "bad lat");
        sink.record_progress(10);
        sink.record_progress(4);

        assert_eq!(sink.skipped_count(), 2);
        assert_eq!(sink.skipped()[0].line, 3);
        assert_eq!(sink.skipped()[1].reason, "bad lat");
        assert_eq!(sink.progress(), 10);
    }

    #[test]
    fn test_clear() {
        let sink = RecordingSink::new();
        sink.record_skipped(1, "x");
        sink.record_progress(1);

        sink.clear();
        assert_eq!(sink.skipped_count(), 0);
        assert_eq!(sink.progress(), 0);
    }

    #[test]
    fn test_noop_and_tracing_sinks_no_panic() {
        for sink in [noop_sink(), tracing_sink()] {
            sink.record_skipped(1, "test");
            sink.record_progress(1_000_000);
        }
    }
}
