//! Route definitions.

mod dashboard;
mod health;
mod page;
mod status;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::middleware;
use axum::response::Response;
use axum::routing::get;

use crate::auth::require_auth;
use crate::state::AppState;

/// Build the complete router.
///
/// # Route Structure
///
/// ## Public (no auth)
/// - `GET /health` - Health check
/// - `GET /` - HTML dashboard
///
/// ## API (auth when tokens are configured)
/// - `GET /api/v1/dashboard` - Full snapshot
/// - `GET /api/v1/sentiment/timeseries` - Per-bucket class counts
/// - `GET /api/v1/sentiment/summary` - Window totals and proportions
/// - `GET /api/v1/hashtags?limit=N` - Top hashtags
/// - `GET /api/v1/status` - Stored record count
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/", get(page::dashboard_page));

    let api_v1 = Router::new()
        .route("/dashboard", get(dashboard::snapshot))
        .route("/sentiment/timeseries", get(dashboard::timeseries))
        .route("/sentiment/summary", get(dashboard::summary))
        .route("/hashtags", get(dashboard::hashtags))
        .route("/status", get(status::status))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(middleware::map_response_with_state(
            state.clone(),
            add_cache_headers,
        ));

    Router::new()
        .merge(public)
        .nest("/api/v1", api_v1)
        .with_state(state)
}

/// Cache successful API responses for one refresh interval; the data
/// cannot change before the next refresh.
async fn add_cache_headers(State(state): State<AppState>, response: Response) -> Response {
    if !response.status().is_success() {
        return response;
    }

    let max_age = state.config.refresh_interval.as_secs();
    let (mut parts, body) = response.into_parts();
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age)) {
        parts.headers.insert(header::CACHE_CONTROL, value);
    }
    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Config;
    use chrono::Utc;
    use murmur_core::{DashboardSnapshot, EnrichedRecord, RecordStore, SqliteStore};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn record(id: &str, compound: f64, hashtags: Option<&str>) -> EnrichedRecord {
        EnrichedRecord {
            id: id.to_string(),
            created_at: Utc::now(),
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

    async fn serve(env: &[(&str, &str)], records: &[EnrichedRecord]) -> String {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(|key: &str| env.get(key).cloned()).unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for r in records {
            store.insert(r).unwrap();
        }
        let state = AppState::new(config, store);
        crate::refresh::refresh_once(&state).await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_status_counts_stored_records() {
        let base = serve(&[], &[record("1", 0.7, None), record("2", 0.0, None)]).await;
        let body: serde_json::Value = reqwest::get(format!("{}/api/v1/status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["total_records"], 2);
        assert_eq!(body["window_records"], 2);
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let base = serve(&[("MURMUR_API_TOKENS", "secret")], &[]).await;
        let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_dashboard_snapshot_with_cache_header() {
        let base = serve(
            &[("MURMUR_REFRESH_SECS", "30")],
            &[record("1", 0.7, Some("rust")), record("2", -0.7, None)],
        )
        .await;

        let resp = reqwest::get(format!("{}/api/v1/dashboard", base)).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("cache-control").unwrap(),
            "public, max-age=30"
        );
        let snapshot: DashboardSnapshot = resp.json().await.unwrap();
        assert_eq!(snapshot.record_count, 2);
        assert_eq!(snapshot.totals.positive, 1);
        assert_eq!(snapshot.totals.negative, 1);
    }

    #[tokio::test]
    async fn test_api_requires_token_when_configured() {
        let base = serve(&[("MURMUR_API_TOKENS", "secret")], &[]).await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{}/api/v1/sentiment/summary", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        assert!(resp.headers().get("cache-control").is_none());

        let resp = client
            .get(format!("{}/api/v1/sentiment/summary", base))
            .bearer_auth("secret")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_empty_window_is_not_an_error() {
        let base = serve(&[], &[]).await;

        let summary: serde_json::Value = reqwest::get(format!("{}/api/v1/sentiment/summary", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(summary["totals"]["total"], 0);
        assert_eq!(summary["proportions"]["positive"], 0.0);

        let series: serde_json::Value =
            reqwest::get(format!("{}/api/v1/sentiment/timeseries", base))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert_eq!(series["buckets"].as_array().unwrap().len(), 0);

        let page = reqwest::get(&base).await.unwrap();
        assert_eq!(page.status(), 200);
        let html = page.text().await.unwrap();
        assert!(html.contains("No posts"));
    }

    #[tokio::test]
    async fn test_hashtags_limit() {
        let base = serve(
            &[],
            &[
                record("1", 0.0, Some("rust,tokio")),
                record("2", 0.0, Some("rust")),
                record("3", 0.0, Some("axum")),
            ],
        )
        .await;

        let tags: serde_json::Value = reqwest::get(format!("{}/api/v1/hashtags?limit=1", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(tags["hashtags"].as_array().unwrap().len(), 1);
        assert_eq!(tags["hashtags"][0]["tag"], "rust");
        assert_eq!(tags["hashtags"][0]["count"], 2);

        let resp = reqwest::get(format!("{}/api/v1/hashtags?limit=0", base))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_page_renders_hashtags_escaped() {
        let base = serve(&[], &[record("1", 0.5, Some("<b>rust"))]).await;
        let html = reqwest::get(&base).await.unwrap().text().await.unwrap();
        assert!(html.contains("&lt;b&gt;rust"));
        assert!(html.contains("http-equiv=\"refresh\""));
    }
}
