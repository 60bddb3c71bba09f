use std::collections::HashSet;
use std::fmt;

use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::dedup::Deduplicator;
use crate::error::AppError;
use crate::extract::FactExtractor;
use crate::models::{EarthquakeRecord, RawBlock, RejectReason, identity_key};
use crate::traits::{MessageSource, RecordSink};

/// Where the coordinator is within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Revealing more content (initial state).
    Scrolling,
    /// Running captured blocks through dedup and extraction.
    DrainingNewContent,
    Done,
}

/// Why a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stalled,
    MaxIterations,
    MaxRecords,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(StopReason),
    Cancelled,
    /// The source could not capture or scroll. Records accepted before the
    /// failure were still flushed to the sink.
    SourceFailed(AppError),
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed(StopReason::Stalled) => "completed_stalled",
            RunOutcome::Completed(StopReason::MaxIterations) => "completed_max_iterations",
            RunOutcome::Completed(StopReason::MaxRecords) => "completed_max_records",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::SourceFailed(_) => "source_failed",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::SourceFailed(e) => write!(f, "{}: {e}", self.as_str()),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    /// Accepted records in acceptance order; exactly what the sink received.
    pub records: Vec<EarthquakeRecord>,
    pub outcome: RunOutcome,
    pub iterations: u32,
    /// Captured blocks skipped because their identity was already accepted
    /// or rejected earlier in the run.
    pub duplicates: usize,
    pub not_earthquake: usize,
    pub missing_magnitude: usize,
}

impl RunReport {
    /// False only when the run stopped early because the source failed.
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, RunOutcome::SourceFailed(_))
    }
}

/// Events emitted by the coordinator for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    Started,
    Captured {
        iteration: u32,
        blocks: usize,
    },
    Accepted {
        record: &'a EarthquakeRecord,
        total: usize,
    },
    Rejected {
        record: &'a EarthquakeRecord,
        reason: RejectReason,
    },
    Reloading {
        iteration: u32,
    },
    Scrolled {
        iteration: u32,
        loaded: bool,
    },
    ScrollTimedOut {
        iteration: u32,
        timeout_secs: u64,
    },
    Stalled {
        consecutive: u32,
        tolerance: u32,
    },
    Finished {
        outcome: &'a RunOutcome,
        records: usize,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPipelineReporter;

impl PipelineReporter for TracingPipelineReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::Started => {
                tracing::info!("Pipeline started");
            }
            PipelineEvent::Captured { iteration, blocks } => {
                tracing::debug!(%iteration, %blocks, "Captured visible blocks");
            }
            PipelineEvent::Accepted { record, total } => {
                tracing::info!(
                    key = %&record.identity_key[..8],
                    magnitude = ?record.magnitude,
                    location = ?record.location_text,
                    %total,
                    "Earthquake record accepted"
                );
                if !record.partial_fields.is_empty() {
                    tracing::debug!(
                        key = %&record.identity_key[..8],
                        fields = ?record.partial_fields,
                        "Optional fields did not parse"
                    );
                }
            }
            PipelineEvent::Rejected { record, reason } => match reason {
                RejectReason::MissingMagnitude => {
                    tracing::info!(
                        key = %&record.identity_key[..8],
                        %reason,
                        "Seismic-looking block rejected"
                    );
                }
                RejectReason::NotEarthquakeContent => {
                    tracing::debug!(key = %&record.identity_key[..8], %reason, "Block skipped");
                }
            },
            PipelineEvent::Reloading { iteration } => {
                tracing::info!(%iteration, "Reloading page to find more posts");
            }
            PipelineEvent::Scrolled { iteration, loaded } => {
                tracing::debug!(%iteration, %loaded, "Scrolled");
            }
            PipelineEvent::ScrollTimedOut {
                iteration,
                timeout_secs,
            } => {
                tracing::warn!(%iteration, %timeout_secs, "Scroll did not settle in time");
            }
            PipelineEvent::Stalled {
                consecutive,
                tolerance,
            } => {
                tracing::info!(%consecutive, %tolerance, "No new records this iteration");
            }
            PipelineEvent::Finished { outcome, records } => {
                tracing::info!(%outcome, %records, "Pipeline finished");
            }
        }
    }
}

#[derive(Debug, Default)]
struct DrainStats {
    accepted: usize,
    duplicates: usize,
    not_earthquake: usize,
    missing_magnitude: usize,
}

/// Drives capture → extract → dedupe iterations until a stop condition
/// fires, then hands everything accepted to the sink.
///
/// A coordinator owns the deduplicator for its run; no state is shared
/// with other coordinators. Rejected identities are remembered separately
/// so each distinct block is extracted once per run.
pub struct PipelineCoordinator<S, K>
where
    S: MessageSource,
    K: RecordSink,
{
    source: S,
    sink: K,
    extractor: FactExtractor,
    dedup: Deduplicator,
    rejected: HashSet<String>,
    config: PipelineConfig,
    state: CoordinatorState,
}

impl<S, K> PipelineCoordinator<S, K>
where
    S: MessageSource,
    K: RecordSink,
{
    pub fn new(source: S, sink: K, config: PipelineConfig) -> Self {
        Self {
            source,
            sink,
            extractor: FactExtractor::new(),
            dedup: Deduplicator::new(),
            rejected: HashSet::new(),
            config,
            state: CoordinatorState::Scrolling,
        }
    }

    pub fn with_extractor(mut self, extractor: FactExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Start from a pre-seeded deduplicator, e.g. keys found in earlier outputs.
    pub fn with_deduplicator(mut self, dedup: Deduplicator) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    fn limit_reached(&self, accepted: usize) -> bool {
        self.config.max_records.is_some_and(|max| accepted >= max)
    }

    fn should_reload(&self, iteration: u32, accepted: usize) -> bool {
        let Some(every) = self.config.refresh_every else {
            return false;
        };
        let under_half = match self.config.max_records {
            Some(max) => accepted * 2 < max,
            None => true,
        };
        every > 0 && iteration % every == 0 && under_half
    }

    /// Run the pipeline until a stop condition fires or `cancel_token` is
    /// cancelled at an iteration boundary.
    ///
    /// The sink always receives the accumulated records, including after a
    /// source failure. Only a sink failure is returned as `Err`; the job of
    /// telling a clean run from an early stop falls to [`RunReport::outcome`].
    pub async fn run<R: PipelineReporter>(
        &mut self,
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Result<RunReport, AppError> {
        let captured_at = Local::now();
        let mut records: Vec<EarthquakeRecord> = Vec::new();
        let mut stats = DrainStats::default();
        let mut iterations: u32 = 0;
        let mut stalls: u32 = 0;

        self.state = CoordinatorState::Scrolling;
        self.rejected.clear();
        reporter.report(PipelineEvent::Started);

        let outcome = loop {
            if cancel_token.is_cancelled() {
                break RunOutcome::Cancelled;
            }
            iterations += 1;

            self.state = CoordinatorState::DrainingNewContent;
            let blocks = match self.source.capture_visible_blocks().await {
                Ok(blocks) => blocks,
                Err(e) => break RunOutcome::SourceFailed(e),
            };
            reporter.report(PipelineEvent::Captured {
                iteration: iterations,
                blocks: blocks.len(),
            });

            let accepted_before = stats.accepted;
            self.drain(&blocks, &mut records, &mut stats, reporter);
            let accepted_now = stats.accepted - accepted_before;

            if self.limit_reached(records.len()) {
                break RunOutcome::Completed(StopReason::MaxRecords);
            }

            self.state = CoordinatorState::Scrolling;
            if self.should_reload(iterations, records.len()) {
                reporter.report(PipelineEvent::Reloading {
                    iteration: iterations,
                });
                if let Err(e) = self.source.reload().await {
                    break RunOutcome::SourceFailed(e);
                }
            }

            let timeout = self.config.settle_timeout;
            let loaded = tokio::select! {
                biased;
                () = cancel_token.cancelled() => break RunOutcome::Cancelled,
                result = tokio::time::timeout(timeout, self.source.scroll_further()) => {
                    match result {
                        Ok(Ok(loaded)) => loaded,
                        Ok(Err(e)) if e.is_fatal() => break RunOutcome::SourceFailed(e),
                        Ok(Err(_)) | Err(_) => {
                            reporter.report(PipelineEvent::ScrollTimedOut {
                                iteration: iterations,
                                timeout_secs: timeout.as_secs(),
                            });
                            false
                        }
                    }
                }
            };
            reporter.report(PipelineEvent::Scrolled {
                iteration: iterations,
                loaded,
            });

            if accepted_now == 0 && !loaded {
                stalls += 1;
                reporter.report(PipelineEvent::Stalled {
                    consecutive: stalls,
                    tolerance: self.config.stall_tolerance,
                });
                if stalls >= self.config.stall_tolerance {
                    break RunOutcome::Completed(StopReason::Stalled);
                }
            } else {
                stalls = 0;
            }

            if iterations >= self.config.max_iterations {
                break RunOutcome::Completed(StopReason::MaxIterations);
            }
        };

        self.state = CoordinatorState::Done;
        reporter.report(PipelineEvent::Finished {
            outcome: &outcome,
            records: records.len(),
        });

        if let Err(e) = self.sink.write(&records, captured_at) {
            return Err(match &outcome {
                RunOutcome::SourceFailed(source) => AppError::SinkError(format!(
                    "{e} (run had already stopped: {source})"
                )),
                _ => e,
            });
        }

        Ok(RunReport {
            records,
            outcome,
            iterations,
            duplicates: stats.duplicates,
            not_earthquake: stats.not_earthquake,
            missing_magnitude: stats.missing_magnitude,
        })
    }

    /// Feed one capture through dedup and extraction. Stops early once
    /// `max_records` is reached.
    fn drain<R: PipelineReporter>(
        &mut self,
        blocks: &[RawBlock],
        records: &mut Vec<EarthquakeRecord>,
        stats: &mut DrainStats,
        reporter: &R,
    ) {
        for block in blocks {
            if self.limit_reached(records.len()) {
                return;
            }

            let key = identity_key(&block.text);
            if !self.dedup.is_new(&key) || self.rejected.contains(&key) {
                stats.duplicates += 1;
                continue;
            }

            let record = self.extractor.extract(&block.text).with_source(block);
            match record.status.reject_reason() {
                None => {
                    self.dedup.mark_seen(&record.identity_key);
                    stats.accepted += 1;
                    reporter.report(PipelineEvent::Accepted {
                        record: &record,
                        total: records.len() + 1,
                    });
                    records.push(record);
                }
                Some(reason) => {
                    self.rejected.insert(key);
                    match reason {
                        RejectReason::NotEarthquakeContent => stats.not_earthquake += 1,
                        RejectReason::MissingMagnitude => stats.missing_magnitude += 1,
                    }
                    reporter.report(PipelineEvent::Rejected {
                        record: &record,
                        reason,
                    });
                }
            }
        }
    }
}
