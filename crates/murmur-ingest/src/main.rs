//! Murmur ingestion daemon.
//!
//! Connects to the provider's filtered stream (or replays a capture), scores
//! each post and writes enriched records to the SQLite store until the target
//! count is reached, the provider rate-limits us, or the connection drops.
//!
//! # Usage
//!
//! ```bash
//! # Live stream
//! MURMUR_STREAM_TOKEN=... murmur-ingest --track rust,tokio --target-count 4000
//!
//! # Replay a capture into a scratch database
//! murmur-ingest --track rust --replay ./captures/ --db-path /tmp/murmur.db
//! ```
//!
//! A `.env` file (path from `DOTENV_PATH`, default `.env`) is loaded before
//! arguments are parsed, so every flag with an env var can live there.
//!
//! # Exit Status
//!
//! Non-zero on transport failure, store connectivity failure or a
//! non-rate-limit provider error. Rate limiting and reaching the target
//! exit cleanly.

use anyhow::{Context, Result};
use clap::Parser;
use murmur_core::metrics::{init_metrics, start_metrics_server};
use murmur_core::{LexiconScorer, SqliteStore};
use murmur_ingest::{
    EventSource, HttpStreamConfig, HttpStreamSource, IngestSession, JsonlConfig, JsonlSource,
    SessionReport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Murmur ingestion daemon.
#[derive(Parser, Debug)]
#[command(name = "murmur-ingest")]
#[command(about = "Live post-stream sentiment ingestion")]
#[command(version)]
struct Args {
    /// SQLite database path
    #[arg(long, env = "MURMUR_DB_PATH", default_value = "./data/murmur.db")]
    db_path: PathBuf,

    /// Keywords to track (comma-separated)
    #[arg(long, env = "MURMUR_TRACK", value_delimiter = ',', required = true)]
    track: Vec<String>,

    /// Language filter
    #[arg(long, env = "MURMUR_LANGUAGE", default_value = "en")]
    language: String,

    /// Stop after this many records have been written
    #[arg(long, env = "MURMUR_TARGET_COUNT", default_value = "4000")]
    target_count: u64,

    /// Filtered stream endpoint
    #[arg(
        long,
        env = "MURMUR_STREAM_URL",
        default_value = "https://stream.twitter.com/1.1/statuses/filter.json"
    )]
    stream_url: String,

    /// Bearer token for the stream endpoint
    #[arg(long, env = "MURMUR_STREAM_TOKEN", hide_env_values = true)]
    stream_token: Option<String>,

    /// Replay a JSONL capture (file or directory) instead of connecting
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Replay at most this many files from a capture directory
    #[arg(long, requires = "replay")]
    replay_limit: Option<usize>,

    /// Connection timeout in seconds
    #[arg(long, default_value = "30")]
    connect_timeout_secs: u64,

    /// Maximum silence on the stream before giving up, in seconds
    #[arg(long, default_value = "90")]
    read_timeout_secs: u64,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, env = "MURMUR_METRICS_PORT", default_value = "0")]
    metrics_port: u16,
}

fn main() -> Result<()> {
    let dotenv_path = std::env::var("DOTENV_PATH").unwrap_or_else(|_| ".env".to_string());
    if std::path::Path::new(&dotenv_path).exists() {
        dotenvy::from_path(&dotenv_path)
            .with_context(|| format!("Failed to load {}", dotenv_path))?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("murmur_ingest=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let track: Vec<String> = args
        .track
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if track.is_empty() {
        anyhow::bail!("--track needs at least one keyword");
    }

    tracing::info!("Murmur ingestion daemon starting...");

    // Keep the runtime alive for the metrics server's lifetime
    let _metrics_runtime = if args.metrics_port > 0 {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .context("Failed to build metrics runtime")?;
        let handle = init_metrics().context("Failed to install metrics recorder")?;
        rt.block_on(start_metrics_server(args.metrics_port, handle))
            .context("Failed to start metrics server")?;
        Some(rt)
    } else {
        None
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping gracefully...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let store = SqliteStore::open(&args.db_path)
        .with_context(|| format!("Failed to open store at {}", args.db_path.display()))?;
    let existing = murmur_core::RecordStore::count(&store)?;

    tracing::info!("Configuration:");
    tracing::info!("  Database: {} ({} records)", args.db_path.display(), existing);
    tracing::info!("  Track: {}", track.join(","));
    tracing::info!("  Language: {}", args.language);
    tracing::info!("  Target count: {}", args.target_count);
    match &args.replay {
        Some(path) => tracing::info!("  Source: replay {}", path.display()),
        None => tracing::info!("  Source: {}", args.stream_url),
    }

    let mut session = IngestSession::new(store, LexiconScorer::new(), args.target_count, &track)
        .with_running_flag(Arc::clone(&running));

    let report = match &args.replay {
        Some(path) => {
            let mut source = JsonlSource::new(JsonlConfig {
                input: path.clone(),
                limit: args.replay_limit,
                ..Default::default()
            });
            run(&mut session, &mut source)?
        }
        None => {
            if args.stream_token.is_none() {
                tracing::warn!("No stream token configured; the endpoint will likely reject us");
            }
            let mut source = HttpStreamSource::new(HttpStreamConfig {
                url: args.stream_url.clone(),
                token: args.stream_token.clone(),
                track: track.clone(),
                language: Some(args.language.clone()),
                connect_timeout: Duration::from_secs(args.connect_timeout_secs),
                read_timeout: Duration::from_secs(args.read_timeout_secs),
            })
            .with_running_flag(Arc::clone(&running));
            run(&mut session, &mut source)?
        }
    };

    print_summary(&report);

    if report.stop_reason.is_failure() {
        anyhow::bail!("Session failed: {}", report.stop_reason);
    }

    Ok(())
}

fn run<E: EventSource>(
    session: &mut IngestSession<SqliteStore, LexiconScorer>,
    source: &mut E,
) -> Result<SessionReport> {
    tracing::info!("Starting ingestion from {} source...", source.name());
    session
        .run(source)
        .with_context(|| format!("Ingestion from {} source aborted", source.name()))
}

fn print_summary(report: &SessionReport) {
    let stats = &report.stats;
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("SESSION COMPLETE: {}", report.stop_reason);
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("Events seen:          {}", stats.events_seen);
    tracing::info!("Records written:      {}", stats.records_written);
    tracing::info!("Reshares skipped:     {}", stats.reshares_skipped);
    tracing::info!("Malformed skipped:    {}", stats.malformed);
    tracing::info!("Duplicates skipped:   {}", stats.duplicates);
    tracing::info!("Provider notices:     {}", stats.notices);
}
