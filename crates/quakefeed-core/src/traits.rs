use std::future::Future;

use chrono::{DateTime, Local};

use crate::error::AppError;
use crate::models::{EarthquakeRecord, RawBlock};

/// Yields raw message blocks from a progressively revealed page.
///
/// Every capture returns all messages currently rendered, including ones
/// returned by earlier captures. Repeats are expected, not an error.
pub trait MessageSource: Send + Sync {
    /// Capture every message block currently visible.
    fn capture_visible_blocks(
        &self,
    ) -> impl Future<Output = Result<Vec<RawBlock>, AppError>> + Send;

    /// Reveal more content. Returns whether new content was plausibly loaded.
    fn scroll_further(&self) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Reload the page from the top. Sources without a page treat this as a no-op.
    fn reload(&self) -> impl Future<Output = Result<(), AppError>> + Send {
        async { Ok(()) }
    }
}

/// Persists the accepted records of one run.
pub trait RecordSink: Send + Sync {
    /// Write the accumulated records. `captured_at` names the run's outputs.
    fn write(
        &self,
        records: &[EarthquakeRecord],
        captured_at: DateTime<Local>,
    ) -> Result<(), AppError>;
}

/// A no-op RecordSink for use when persistence is not needed.
#[derive(Debug, Clone)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn write(
        &self,
        _records: &[EarthquakeRecord],
        _captured_at: DateTime<Local>,
    ) -> Result<(), AppError> {
        Ok(())
    }
}
