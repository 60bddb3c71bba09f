use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use quakefeed_core::error::AppError;
use quakefeed_core::models::RawBlock;
use quakefeed_core::traits::MessageSource;

use crate::blocks::HtmlBlockParser;

/// Replays saved page captures as if they were successive scroll passes.
///
/// Each `.html`/`.htm` file in the directory is one pass, in filename order.
/// Capturing parses the current file. Scrolling moves to the next one and
/// reports `false` once the last file is reached. Reloading rewinds to the
/// first file.
pub struct SnapshotSource {
    snapshots: Vec<PathBuf>,
    position: AtomicUsize,
    parser: HtmlBlockParser,
}

impl SnapshotSource {
    pub fn open(dir: &Path, parser: HtmlBlockParser) -> Result<Self, AppError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            AppError::SourceUnavailable(format!(
                "Cannot read snapshot directory {}: {e}",
                dir.display()
            ))
        })?;

        let mut snapshots: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm")
                    })
            })
            .collect();
        snapshots.sort();

        if snapshots.is_empty() {
            return Err(AppError::SourceUnavailable(format!(
                "No .html snapshots found in {}",
                dir.display()
            )));
        }

        tracing::info!(count = snapshots.len(), dir = %dir.display(), "Loaded snapshots");

        Ok(Self {
            snapshots,
            position: AtomicUsize::new(0),
            parser,
        })
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl MessageSource for SnapshotSource {
    async fn capture_visible_blocks(&self) -> Result<Vec<RawBlock>, AppError> {
        let path = &self.snapshots[self.position.load(Ordering::SeqCst)];
        let html = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::SourceUnavailable(format!("Cannot read snapshot {}: {e}", path.display()))
        })?;
        let blocks = self.parser.parse(&html);
        tracing::debug!(snapshot = %path.display(), blocks = blocks.len(), "Captured snapshot");
        Ok(blocks)
    }

    async fn scroll_further(&self) -> Result<bool, AppError> {
        let last = self.snapshots.len() - 1;
        let advanced = self
            .position
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pos| {
                (pos < last).then_some(pos + 1)
            })
            .is_ok();
        Ok(advanced)
    }

    async fn reload(&self) -> Result<(), AppError> {
        self.position.store(0, Ordering::SeqCst);
        Ok(())
    }
}
