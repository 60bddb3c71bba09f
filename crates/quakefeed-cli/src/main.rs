use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

use quakefeed_client::{CsvSink, HtmlBlockParser, SnapshotSource};
use quakefeed_core::traits::MessageSource;
use quakefeed_core::{
    Deduplicator, FactExtractor, PipelineConfig, PipelineCoordinator, RunOutcome,
    TracingPipelineReporter,
};

const DEFAULT_TIMELINE: &str = "https://x.com/phivolcs_dost";

#[derive(Parser)]
#[command(
    name = "quakefeed",
    version,
    about = "Collect PHIVOLCS earthquake bulletins into CSV"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll the live timeline in headless Chromium
    #[cfg(feature = "browser")]
    Scrape {
        /// Timeline URL
        #[arg(short, long, env = "QUAKEFEED_URL", default_value = DEFAULT_TIMELINE)]
        url: String,

        /// Seconds to wait for the first render
        #[arg(long, default_value_t = 60)]
        navigation_timeout_secs: u64,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Replay saved timeline pages, one file per scroll pass
    Replay {
        /// Directory of .html snapshots, replayed in filename order
        #[arg(short, long)]
        snapshots: PathBuf,

        /// URL the snapshots were taken from, used to resolve permalinks
        #[arg(long, default_value = DEFAULT_TIMELINE)]
        base_url: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Extract one bulletin and print the record as JSON
    Extract {
        /// Message text (reads stdin if omitted)
        text: Option<String>,
    },
}

/// Options shared by every pipeline run. Unset limits fall back to
/// `QUAKEFEED_*` environment variables, then to built-in defaults.
#[derive(Args)]
struct RunArgs {
    /// Directory for the raw and cleaned CSV files
    #[arg(short, long, env = "QUAKEFEED_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Skip bulletins already present in earlier raw files of the output directory
    #[arg(long, default_value_t = false)]
    skip_known: bool,

    #[arg(long)]
    max_iterations: Option<u32>,

    #[arg(long)]
    stall_tolerance: Option<u32>,

    #[arg(long)]
    settle_timeout_secs: Option<u64>,

    /// Stop after this many accepted records (0 for no limit)
    #[arg(long)]
    max_records: Option<usize>,

    /// Reload the page every N iterations (0 disables)
    #[arg(long)]
    refresh_every: Option<u32>,
}

impl RunArgs {
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::from_env().context("Invalid QUAKEFEED_* environment")?;

        if let Some(n) = self.max_iterations {
            anyhow::ensure!(n > 0, "--max-iterations must be positive");
            config.max_iterations = n;
        }
        if let Some(n) = self.stall_tolerance {
            anyhow::ensure!(n > 0, "--stall-tolerance must be positive");
            config.stall_tolerance = n;
        }
        if let Some(secs) = self.settle_timeout_secs {
            anyhow::ensure!(secs > 0, "--settle-timeout-secs must be positive");
            config.settle_timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(n) = self.max_records {
            config.max_records = (n > 0).then_some(n);
        }
        if let Some(n) = self.refresh_every {
            config.refresh_every = (n > 0).then_some(n);
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("quakefeed=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "browser")]
        Commands::Scrape {
            url,
            navigation_timeout_secs,
            run,
        } => {
            use quakefeed_client::{BrowserSource, ScrollPacing};

            let parser = HtmlBlockParser::new(Url::parse(&url).context("Invalid timeline URL")?);
            let source = BrowserSource::launch(
                &url,
                parser,
                ScrollPacing::default(),
                std::time::Duration::from_secs(navigation_timeout_secs),
            )
            .await
            .context("Failed to open timeline")?;
            cmd_run(source, &run).await?;
        }
        Commands::Replay {
            snapshots,
            base_url,
            run,
        } => {
            let parser = HtmlBlockParser::new(Url::parse(&base_url).context("Invalid base URL")?);
            let source = SnapshotSource::open(&snapshots, parser)?;
            cmd_run(source, &run).await?;
        }
        Commands::Extract { text } => cmd_extract(text)?,
    }

    Ok(())
}

/// Cancel the token on Ctrl+C. The run stops at the next iteration boundary
/// and still flushes what it accepted.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current iteration");
            handle.cancel();
        }
    });
    token
}

fn deduplicator_for(sink: &CsvSink, skip_known: bool, output_dir: &Path) -> Result<Deduplicator> {
    if !skip_known {
        return Ok(Deduplicator::new());
    }
    let known = sink
        .known_identity_keys()
        .with_context(|| format!("Failed to read earlier outputs in {}", output_dir.display()))?;
    tracing::info!(count = known.len(), "Skipping bulletins from earlier runs");
    Ok(Deduplicator::with_known(known))
}

async fn cmd_run<S: MessageSource>(source: S, args: &RunArgs) -> Result<()> {
    let config = args.config()?;
    tracing::info!(?config, "Starting run");

    let sink = CsvSink::new(&args.output_dir);
    let dedup = deduplicator_for(&sink, args.skip_known, &args.output_dir)?;

    let mut coordinator = PipelineCoordinator::new(source, sink, config).with_deduplicator(dedup);
    let report = coordinator
        .run(cancel_on_ctrl_c(), &TracingPipelineReporter)
        .await
        .context("Failed to save records")?;

    let summary = serde_json::json!({
        "outcome": report.outcome.as_str(),
        "iterations": report.iterations,
        "accepted": report.records.len(),
        "duplicates": report.duplicates,
        "not_earthquake": report.not_earthquake,
        "missing_magnitude": report.missing_magnitude,
        "output_dir": args.output_dir.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let RunOutcome::SourceFailed(e) = report.outcome {
        anyhow::bail!(
            "Source failed after {} records were saved: {e}",
            report.records.len()
        );
    }

    Ok(())
}

fn cmd_extract(text: Option<String>) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read message from stdin")?;
            buf
        }
    };

    let record = FactExtractor::new().extract(text.trim());
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(())
}
