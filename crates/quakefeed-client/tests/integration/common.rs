use std::path::{Path, PathBuf};
use std::time::Duration;

use quakefeed_client::HtmlBlockParser;
use quakefeed_core::PipelineConfig;
use url::Url;

pub const ALBAY: &str = "Magnitude = 4.2 - Depth = 10 km - Date and Time = March 3, 2024 - 10:15 AM - Location = 017 km N 45° E of Sto. Domingo (Albay)";

pub const SURIGAO: &str = "#EarthquakeSurigaoDelSur\nEarthquake Information No.1\nDate and Time: 04 Mar 2024 - 02:40 AM\nMagnitude = 3.1\nDepth (km) = 005\nLocation = 12 km S 80° E of Hinatuan (Surigao Del Sur)\nReported Intensity = Intensity II - Hinatuan\nExpecting Damage: No";

pub const NO_MAGNITUDE: &str = "Earthquake felt in Hinatuan. Date and Time = March 4, 2024 - 03:05 AM - Location = Hinatuan";

pub const GREETING: &str = "Happy Monday everyone!";

pub fn parser() -> HtmlBlockParser {
    HtmlBlockParser::new(Url::parse("https://x.com/phivolcs_dost").unwrap())
}

/// Limits small enough for a replay to finish in a handful of iterations.
pub fn replay_config() -> PipelineConfig {
    PipelineConfig {
        max_iterations: 20,
        stall_tolerance: 2,
        settle_timeout: Duration::from_secs(5),
        max_records: None,
        refresh_every: None,
    }
}

/// Render posts the way the timeline does: one article per post, lines
/// separated by `<br>`, with a status link and a timestamp. Like the live
/// timeline, later posts on the page are older.
pub fn timeline_page(posts: &[&str]) -> String {
    let articles: String = posts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let lines: Vec<String> = text.lines().map(|l| format!("<span>{l}</span>")).collect();
            format!(
                r#"<div data-testid="cellInnerDiv"><article data-testid="tweet"><a href="/phivolcs_dost/status/{}">link</a><time datetime="2024-03-{:02}T02:20:00.000Z">Mar</time><div data-testid="tweetText" lang="en">{}</div></article></div>"#,
                1_764_000_000_000_000_000u64 + i as u64,
                28 - i,
                lines.join("<br>")
            )
        })
        .collect();
    format!("<html><body><main>{articles}</main></body></html>")
}

/// Write one snapshot per pass. Like a scrolled timeline, each snapshot
/// holds every post revealed so far.
pub fn write_snapshots(dir: &Path, passes: &[&[&str]]) {
    let mut revealed: Vec<&str> = Vec::new();
    for (i, pass) in passes.iter().enumerate() {
        revealed.extend_from_slice(pass);
        std::fs::write(dir.join(format!("{:02}.html", i + 1)), timeline_page(&revealed)).unwrap();
    }
}

/// The single output file in `dir` whose name starts with `stem`.
pub fn output_file(dir: &Path, stem: &str) -> PathBuf {
    let matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(stem))
        })
        .collect();
    assert_eq!(matches.len(), 1, "expected one {stem} file, found {matches:?}");
    matches.into_iter().next().unwrap()
}

pub fn read_rows(path: &Path, delimiter: u8) -> (csv::StringRecord, Vec<csv::StringRecord>) {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .unwrap();
    let headers = reader.headers().unwrap().clone();
    let rows = reader.records().map(|r| r.unwrap()).collect();
    (headers, rows)
}
