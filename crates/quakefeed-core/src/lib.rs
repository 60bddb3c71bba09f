pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod traits;

pub use config::PipelineConfig;
pub use dedup::Deduplicator;
pub use error::AppError;
pub use extract::FactExtractor;
pub use models::{
    EarthquakeRecord, RawBlock, RecordField, RecordStatus, RejectReason, compute_hash,
    identity_key, normalize_text,
};
pub use pipeline::{
    CoordinatorState, PipelineCoordinator, PipelineEvent, PipelineReporter, RunOutcome,
    RunReport, StopReason, TracingPipelineReporter,
};
pub use traits::{MessageSource, NullSink, RecordSink};
