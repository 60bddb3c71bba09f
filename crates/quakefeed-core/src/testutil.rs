//! Test utilities: mock implementations of the source and sink traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::AppError;
use crate::models::{EarthquakeRecord, RawBlock};
use crate::traits::{MessageSource, RecordSink};

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SourceState {
    /// Message texts revealed by each scroll pass.
    passes: Vec<Vec<String>>,
    /// Index of the last revealed pass.
    position: usize,
    endless: bool,
    capture_calls: usize,
    scroll_calls: usize,
    reload_calls: usize,
    fail_capture_at: Option<usize>,
    fail_scroll_at: Option<usize>,
}

/// Mock source that reveals one pass of messages per successful scroll.
///
/// Like a rendered timeline, each capture returns every message revealed
/// so far, so earlier messages come back on every call.
#[derive(Clone)]
pub struct MockSource {
    state: Arc<Mutex<SourceState>>,
    scroll_delay: Duration,
}

impl MockSource {
    pub fn with_passes(passes: Vec<Vec<String>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SourceState {
                passes,
                ..SourceState::default()
            })),
            scroll_delay: Duration::ZERO,
        }
    }

    /// A source whose scroll always loads another non-earthquake message.
    pub fn endless() -> Self {
        Self {
            state: Arc::new(Mutex::new(SourceState {
                endless: true,
                ..SourceState::default()
            })),
            scroll_delay: Duration::ZERO,
        }
    }

    /// Fail the n-th capture call (1-indexed).
    pub fn fail_capture_at(self, call: usize) -> Self {
        self.state.lock().unwrap().fail_capture_at = Some(call);
        self
    }

    /// Fail the n-th scroll call (1-indexed).
    pub fn fail_scroll_at(self, call: usize) -> Self {
        self.state.lock().unwrap().fail_scroll_at = Some(call);
        self
    }

    /// Sleep before each scroll takes effect.
    pub fn with_scroll_delay(mut self, delay: Duration) -> Self {
        self.scroll_delay = delay;
        self
    }

    pub fn capture_calls(&self) -> usize {
        self.state.lock().unwrap().capture_calls
    }

    pub fn scroll_calls(&self) -> usize {
        self.state.lock().unwrap().scroll_calls
    }

    pub fn reload_calls(&self) -> usize {
        self.state.lock().unwrap().reload_calls
    }
}

impl MessageSource for MockSource {
    async fn capture_visible_blocks(&self) -> Result<Vec<RawBlock>, AppError> {
        let mut state = self.state.lock().unwrap();
        state.capture_calls += 1;
        if state.fail_capture_at == Some(state.capture_calls) {
            return Err(AppError::SourceUnavailable("page crashed".into()));
        }

        let blocks = if state.endless {
            (0..=state.position)
                .map(|i| RawBlock::new(format!("Filler post number {i}"), i))
                .collect()
        } else {
            state
                .passes
                .iter()
                .take(state.position + 1)
                .flatten()
                .enumerate()
                .map(|(order, text)| RawBlock::new(text.clone(), order))
                .collect()
        };
        Ok(blocks)
    }

    async fn scroll_further(&self) -> Result<bool, AppError> {
        {
            let mut state = self.state.lock().unwrap();
            state.scroll_calls += 1;
            if state.fail_scroll_at == Some(state.scroll_calls) {
                return Err(AppError::SourceUnavailable("scroll failed".into()));
            }
        }

        if !self.scroll_delay.is_zero() {
            tokio::time::sleep(self.scroll_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.endless || state.position + 1 < state.passes.len() {
            state.position += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn reload(&self) -> Result<(), AppError> {
        self.state.lock().unwrap().reload_calls += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Mock sink that records every write.
#[derive(Clone)]
pub struct MockSink {
    writes: Arc<Mutex<Vec<Vec<EarthquakeRecord>>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            writes: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a sink whose first write fails.
    pub fn with_error(error: AppError) -> Self {
        Self {
            writes: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }

    /// Records passed to the most recent write.
    pub fn written(&self) -> Vec<EarthquakeRecord> {
        self.writes.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn write_calls(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSink for MockSink {
    fn write(
        &self,
        records: &[EarthquakeRecord],
        _captured_at: DateTime<Local>,
    ) -> Result<(), AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        self.writes.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}
