//! Murmur Serve - live sentiment dashboard.
//!
//! This binary opens the record store written by `murmur-ingest`, refreshes
//! the dashboard snapshot on a fixed interval, and serves the HTML page and
//! JSON API.

use std::sync::Arc;

use anyhow::Context;
use axum::http::Request;
use clap::Parser;
use murmur_core::SqliteStore;
use murmur_core::metrics::{init_metrics, start_metrics_server};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use murmur_serve::{AppState, Config, router, spawn_refresh_task};

/// Murmur sentiment dashboard server.
#[derive(Parser, Debug)]
#[command(name = "murmur-serve")]
#[command(about = "Live sentiment dashboard and JSON API", long_about = None)]
#[command(version)]
struct Args {
    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr.clone();

    if config.metrics_port > 0 {
        let handle = init_metrics().context("Failed to install metrics recorder")?;
        start_metrics_server(config.metrics_port, handle).await?;
    }

    // Opened read-write so the schema exists even before the first ingest run.
    let db_path = config.db_path.clone();
    let store = tokio::task::spawn_blocking(move || SqliteStore::open(&db_path))
        .await?
        .with_context(|| format!("Failed to open store at {}", config.db_path.display()))?;

    let state = AppState::new(config, Arc::new(store));
    let refresh = spawn_refresh_task(state.clone());

    let app = router(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    query = request.uri().query().unwrap_or("")
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("shutdown signal received"),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    refresh.abort();
    Ok(())
}
