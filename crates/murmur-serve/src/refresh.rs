//! Periodic dashboard refresh.
//!
//! Queries the trailing window on the blocking pool, aggregates it and
//! swaps the shared snapshot. A failed refresh keeps the previous snapshot.

use std::time::Instant;

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use murmur_core::{DashboardSnapshot, RecordStore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::state::AppState;

/// Recompute the snapshot once.
pub async fn refresh_once(state: &AppState) -> anyhow::Result<()> {
    let started = Instant::now();
    let store = state.store.clone();
    let config = state.config.aggregate();
    let now = Utc::now();
    let since = config.window_start(now);

    let records = tokio::task::spawn_blocking(move || store.query_since(since)).await??;
    let snapshot = DashboardSnapshot::compute(&records, now, &config);

    tracing::debug!(
        records = snapshot.record_count,
        buckets = snapshot.timeseries.len(),
        "dashboard refreshed"
    );
    gauge!("dashboard_window_records").set(snapshot.record_count as f64);
    histogram!("dashboard_refresh_duration_seconds").record(started.elapsed().as_secs_f64());

    *state.snapshot.write() = snapshot;
    Ok(())
}

/// Spawn the refresh loop. The first refresh runs immediately.
pub fn spawn_refresh_task(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match refresh_once(&state).await {
                Ok(()) => counter!("dashboard_refresh_total").increment(1),
                Err(e) => {
                    counter!("dashboard_refresh_errors_total").increment(1);
                    tracing::warn!(
                        error = %e,
                        "dashboard refresh failed, keeping previous snapshot"
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Config;
    use chrono::Duration;
    use murmur_core::{EnrichedRecord, SqliteStore};
    use std::sync::Arc;

    fn record(id: &str, age_secs: i64, compound: f64, hashtags: Option<&str>) -> EnrichedRecord {
        EnrichedRecord {
            id: id.to_string(),
            created_at: Utc::now() - Duration::seconds(age_secs),
            author: "bob".to_string(),
            text: "text".to_string(),
            retweet_count: 0,
            favorite_count: 0,
            neg_score: 0.0,
            neu_score: 1.0,
            pos_score: 0.0,
            compound_score: compound,
            hashtags: hashtags.map(str::to_string),
            search_terms: "rust".to_string(),
        }
    }

    fn state() -> AppState {
        let config = Config::from_lookup(|_| None).unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        AppState::new(config, store)
    }

    #[tokio::test]
    async fn test_refresh_reads_window() {
        let state = state();
        state.store.insert(&record("1", 10, 0.6, Some("rust"))).unwrap();
        state.store.insert(&record("2", 20, -0.6, Some("rust,tokio"))).unwrap();
        state.store.insert(&record("old", 3_600, 0.6, Some("stale"))).unwrap();

        refresh_once(&state).await.unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.record_count, 2);
        assert_eq!(snapshot.totals.positive, 1);
        assert_eq!(snapshot.totals.negative, 1);
        assert_eq!(snapshot.top_hashtags[0].tag, "rust");
        assert_eq!(snapshot.top_hashtags[0].count, 2);
    }

    #[tokio::test]
    async fn test_refresh_observes_new_commits() {
        let state = state();
        refresh_once(&state).await.unwrap();
        assert!(state.snapshot().is_empty());

        state.store.insert(&record("1", 1, 0.0, None)).unwrap();
        refresh_once(&state).await.unwrap();
        assert_eq!(state.snapshot().totals.neutral, 1);
    }
}
