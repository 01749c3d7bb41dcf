//! JSON endpoints over the latest dashboard snapshot.

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use murmur_core::{DashboardSnapshot, HashtagCount, SentimentClass, SentimentTotals, TimeBucket};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound for `?limit=`.
const MAX_HASHTAG_LIMIT: usize = 100;

/// `GET /api/v1/dashboard`
pub async fn snapshot(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.snapshot())
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeseriesResponse {
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub bucket_width_secs: u64,
    pub buckets: Vec<TimeBucket>,
}

/// `GET /api/v1/sentiment/timeseries`
///
/// Per-bucket counts for each sentiment class, oldest first.
pub async fn timeseries(State(state): State<AppState>) -> Json<TimeseriesResponse> {
    let snapshot = state.snapshot.read();
    Json(TimeseriesResponse {
        generated_at: snapshot.generated_at,
        window_start: snapshot.window_start,
        bucket_width_secs: snapshot.bucket_width_secs,
        buckets: snapshot.timeseries.clone(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Proportions {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl From<&SentimentTotals> for Proportions {
    fn from(totals: &SentimentTotals) -> Self {
        Self {
            positive: totals.proportion(SentimentClass::Positive),
            neutral: totals.proportion(SentimentClass::Neutral),
            negative: totals.proportion(SentimentClass::Negative),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub totals: SentimentTotals,
    pub proportions: Proportions,
}

/// `GET /api/v1/sentiment/summary`
pub async fn summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let snapshot = state.snapshot.read();
    Json(SummaryResponse {
        generated_at: snapshot.generated_at,
        window_start: snapshot.window_start,
        proportions: Proportions::from(&snapshot.totals),
        totals: snapshot.totals.clone(),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashtagsQuery {
    /// Number of hashtags (default: all ranked, max: 100).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HashtagsResponse {
    pub generated_at: DateTime<Utc>,
    pub hashtags: Vec<HashtagCount>,
}

/// `GET /api/v1/hashtags?limit=N`
///
/// At most as many hashtags as the refresh ranked (`MURMUR_TOP_HASHTAGS`).
pub async fn hashtags(
    State(state): State<AppState>,
    Query(params): Query<HashtagsQuery>,
) -> Result<Json<HashtagsResponse>, ApiError> {
    let limit = match params.limit {
        Some(0) => return Err(ApiError::BadRequest("limit must be at least 1".into())),
        Some(n) if n > MAX_HASHTAG_LIMIT => {
            return Err(ApiError::BadRequest(format!(
                "limit must be at most {}",
                MAX_HASHTAG_LIMIT
            )));
        }
        Some(n) => n,
        None => MAX_HASHTAG_LIMIT,
    };

    let snapshot = state.snapshot.read();
    Ok(Json(HashtagsResponse {
        generated_at: snapshot.generated_at,
        hashtags: snapshot.top_hashtags.iter().take(limit).cloned().collect(),
    }))
}
