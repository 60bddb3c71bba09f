use quakefeed_client::{CsvSink, SnapshotSource};
use quakefeed_core::testutil::MockSource;
use quakefeed_core::{
    Deduplicator, PipelineCoordinator, PipelineConfig, RunOutcome, StopReason,
    TracingPipelineReporter, identity_key,
};
use tokio_util::sync::CancellationToken;

use crate::common::{
    ALBAY, GREETING, NO_MAGNITUDE, SURIGAO, output_file, parser, read_rows, replay_config,
    write_snapshots,
};

const RAW_STEM: &str = "phivolcs_earthquake_data_raw_";
const CLEANED_STEM: &str = "earthquake_data_cleaned_";

#[tokio::test]
async fn replay_writes_each_bulletin_once() {
    let snapshots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_snapshots(
        snapshots.path(),
        &[&[ALBAY, GREETING], &[SURIGAO], &[NO_MAGNITUDE]],
    );

    let source = SnapshotSource::open(snapshots.path(), parser()).unwrap();
    let mut coordinator =
        PipelineCoordinator::new(source, CsvSink::new(out.path()), replay_config());
    let report = coordinator
        .run(CancellationToken::new(), &TracingPipelineReporter)
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::Completed(StopReason::Stalled)
    ));
    assert_eq!(report.iterations, 4);
    assert_eq!(report.records.len(), 2);
    // Rejected posts are extracted once and skipped as repeats afterwards.
    assert_eq!(report.duplicates, 2 + 3 + 4);
    assert_eq!(report.not_earthquake, 1);
    assert_eq!(report.missing_magnitude, 1);

    let (headers, raw) = read_rows(&output_file(out.path(), RAW_STEM), b',');
    assert_eq!(&headers[0], "identity_key");
    assert_eq!(raw.len(), 2);
    assert_eq!(&raw[0][0], identity_key(ALBAY));
    assert_eq!(&raw[0][1], ALBAY);
    assert_eq!(
        &raw[0][8],
        "https://x.com/phivolcs_dost/status/1764000000000000000"
    );
    assert_eq!(&raw[0][9], "2024-03-28T02:20:00.000Z");
    assert_eq!(&raw[1][9], "2024-03-26T02:20:00.000Z");
    assert_eq!(&raw[1][0], identity_key(SURIGAO));
    assert_eq!(&raw[1][1], SURIGAO);

    let (_, cleaned) = read_rows(&output_file(out.path(), CLEANED_STEM), b';');
    assert_eq!(cleaned.len(), 2);
    assert_eq!(&cleaned[0][0], "4.2");
    assert_eq!(&cleaned[0][1], "10.0");
    assert_eq!(&cleaned[0][2], "2024-03-03T10:15:00");
    assert_eq!(&cleaned[0][3], "017 km N 45° E of Sto. Domingo (Albay)");
    assert_eq!(&cleaned[1][0], "3.1");
    assert_eq!(&cleaned[1][1], "5.0");
    assert_eq!(&cleaned[1][3], "12 km S 80° E of Hinatuan (Surigao Del Sur)");
    assert_eq!(&cleaned[1][4], "Intensity II - Hinatuan");
}

#[tokio::test]
async fn known_keys_from_earlier_runs_are_skipped() {
    let snapshots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_snapshots(snapshots.path(), &[&[ALBAY], &[SURIGAO]]);

    let first = {
        let source = SnapshotSource::open(snapshots.path(), parser()).unwrap();
        let mut coordinator =
            PipelineCoordinator::new(source, CsvSink::new(out.path()), replay_config());
        coordinator
            .run(CancellationToken::new(), &TracingPipelineReporter)
            .await
            .unwrap()
    };
    assert_eq!(first.records.len(), 2);

    let sink = CsvSink::new(out.path());
    let known = sink.known_identity_keys().unwrap();
    assert_eq!(known.len(), 2);

    let source = SnapshotSource::open(snapshots.path(), parser()).unwrap();
    let mut coordinator = PipelineCoordinator::new(source, sink, replay_config())
        .with_deduplicator(Deduplicator::with_known(known));
    let second = coordinator
        .run(CancellationToken::new(), &TracingPipelineReporter)
        .await
        .unwrap();

    assert!(second.records.is_empty());
    assert!(second.is_success());
    assert_eq!(second.duplicates, 1 + 2 + 2);
    // The empty second run leaves only the first run's two files behind.
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn record_limit_stops_the_replay() {
    let snapshots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_snapshots(snapshots.path(), &[&[ALBAY, SURIGAO]]);

    let config = PipelineConfig {
        max_records: Some(1),
        ..replay_config()
    };
    let source = SnapshotSource::open(snapshots.path(), parser()).unwrap();
    let mut coordinator = PipelineCoordinator::new(source, CsvSink::new(out.path()), config);
    let report = coordinator
        .run(CancellationToken::new(), &TracingPipelineReporter)
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::Completed(StopReason::MaxRecords)
    ));
    assert_eq!(report.iterations, 1);

    let (_, raw) = read_rows(&output_file(out.path(), RAW_STEM), b',');
    assert_eq!(raw.len(), 1);
    assert_eq!(&raw[0][1], ALBAY);
}

#[tokio::test]
async fn source_failure_still_flushes_accepted_records() {
    let out = tempfile::tempdir().unwrap();
    let source = MockSource::with_passes(vec![vec![ALBAY.into()], vec![SURIGAO.into()]])
        .fail_capture_at(2);

    let mut coordinator =
        PipelineCoordinator::new(source, CsvSink::new(out.path()), replay_config());
    let report = coordinator
        .run(CancellationToken::new(), &TracingPipelineReporter)
        .await
        .unwrap();

    assert!(matches!(report.outcome, RunOutcome::SourceFailed(_)));
    assert!(!report.is_success());

    let (_, raw) = read_rows(&output_file(out.path(), RAW_STEM), b',');
    assert_eq!(raw.len(), 1);
    assert_eq!(&raw[0][1], ALBAY);
    // Blocks without page metadata leave those columns empty.
    assert_eq!(&raw[0][8], "");
    assert_eq!(&raw[0][9], "");
}

#[tokio::test]
async fn cancelled_before_start_writes_nothing() {
    let snapshots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_snapshots(snapshots.path(), &[&[ALBAY]]);

    let token = CancellationToken::new();
    token.cancel();

    let source = SnapshotSource::open(snapshots.path(), parser()).unwrap();
    let mut coordinator =
        PipelineCoordinator::new(source, CsvSink::new(out.path()), replay_config());
    let report = coordinator.run(token, &TracingPipelineReporter).await.unwrap();

    assert!(matches!(report.outcome, RunOutcome::Cancelled));
    assert_eq!(report.iterations, 0);
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}
