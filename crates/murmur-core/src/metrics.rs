//! Prometheus metrics helpers for the Murmur pipeline.
//!
//! Both binaries install one recorder at startup and optionally expose it on
//! a `/metrics` endpoint.
//!
//! # Usage
//!
//! ```rust,ignore
//! use murmur_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let handle = init_metrics()?;
//!     start_metrics_server(9091, handle).await?;
//!
//!     metrics::counter!("ingest_events_total").increment(1);
//!     Ok(())
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`ingest_`, `dashboard_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - No labels on per-event counters

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Install the Prometheus recorder and register metric descriptions.
///
/// Fails if a recorder is already installed for this process.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(handle)
}

/// Serve `/metrics` on `0.0.0.0:port` from a background task.
///
/// The listener is bound before returning, so a port conflict is reported
/// to the caller.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server failed: {}", e);
        }
    });

    Ok(())
}

fn register_metrics() {
    // =========================================================================
    // Ingestion
    // =========================================================================

    describe_counter!(
        "ingest_events_total",
        "Total stream events delivered to the ingestion handler"
    );
    describe_counter!(
        "ingest_records_written_total",
        "Enriched records committed to the store"
    );
    describe_counter!(
        "ingest_reshares_skipped_total",
        "Reshare events dropped before enrichment"
    );
    describe_counter!(
        "ingest_events_malformed_total",
        "Events without usable text, skipped"
    );
    describe_counter!(
        "ingest_records_duplicate_total",
        "Records rejected by the store as duplicates"
    );
    describe_gauge!(
        "ingest_running",
        "Whether an ingestion session is running (1=yes, 0=no)"
    );

    // =========================================================================
    // Dashboard
    // =========================================================================

    describe_counter!("dashboard_refresh_total", "Dashboard refresh cycles completed");
    describe_counter!(
        "dashboard_refresh_errors_total",
        "Dashboard refresh cycles that failed to query the store"
    );
    describe_gauge!(
        "dashboard_window_records",
        "Records in the current dashboard window"
    );
    describe_histogram!(
        "dashboard_refresh_duration_seconds",
        "Time spent querying and aggregating one refresh"
    );
}
