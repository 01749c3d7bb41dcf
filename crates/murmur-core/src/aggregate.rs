//! Sliding-window aggregation for the dashboard.
//!
//! Given the records of a trailing window, compute:
//!
//! - a time series of per-class counts in fixed-width buckets
//! - global per-class totals
//! - the top-N hashtags (case-insensitive)
//!
//! All functions are pure over a slice of records. An empty slice yields an
//! empty series, zero totals and no hashtags.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::post::EnrichedRecord;
use crate::sentiment::SentimentClass;

/// Window and bucketing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateConfig {
    /// Trailing window length.
    pub window: Duration,
    /// Time-series bucket width.
    pub bucket_width: Duration,
    /// Number of hashtags to rank.
    pub top_hashtags: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(600),
            bucket_width: Duration::from_secs(5),
            top_hashtags: 10,
        }
    }
}

impl AggregateConfig {
    /// Start of the window ending at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::zero());
        now - window
    }
}

/// Per-class counts for one time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Inclusive bucket start, aligned to a multiple of the bucket width.
    pub start: DateTime<Utc>,
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

impl TimeBucket {
    fn empty(start: DateTime<Utc>) -> Self {
        Self {
            start,
            positive: 0,
            neutral: 0,
            negative: 0,
        }
    }

    fn add(&mut self, class: SentimentClass) {
        match class {
            SentimentClass::Positive => self.positive += 1,
            SentimentClass::Neutral => self.neutral += 1,
            SentimentClass::Negative => self.negative += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.positive + self.neutral + self.negative
    }

    pub fn count(&self, class: SentimentClass) -> u64 {
        match class {
            SentimentClass::Positive => self.positive,
            SentimentClass::Neutral => self.neutral,
            SentimentClass::Negative => self.negative,
        }
    }
}

/// Per-class totals over the whole window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentTotals {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
    pub total: u64,
}

impl SentimentTotals {
    pub fn count(&self, class: SentimentClass) -> u64 {
        match class {
            SentimentClass::Positive => self.positive,
            SentimentClass::Neutral => self.neutral,
            SentimentClass::Negative => self.negative,
        }
    }

    /// Share of the window in `class`, 0.0 when the window is empty.
    pub fn proportion(&self, class: SentimentClass) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(class) as f64 / self.total as f64
        }
    }
}

/// A hashtag and the number of window records using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagCount {
    pub tag: String,
    pub count: u64,
}

/// Everything the dashboard renders, computed in one pass per refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub bucket_width_secs: u64,
    pub record_count: usize,
    pub timeseries: Vec<TimeBucket>,
    pub totals: SentimentTotals,
    pub top_hashtags: Vec<HashtagCount>,
}

impl DashboardSnapshot {
    /// Snapshot for an empty window.
    pub fn empty(now: DateTime<Utc>, config: &AggregateConfig) -> Self {
        Self::compute(&[], now, config)
    }

    /// Aggregate the records of the window ending at `now`.
    ///
    /// Records older than the window start are ignored, so callers may pass
    /// a superset.
    pub fn compute(
        records: &[EnrichedRecord],
        now: DateTime<Utc>,
        config: &AggregateConfig,
    ) -> Self {
        let window_start = config.window_start(now);
        let in_window: Vec<&EnrichedRecord> = records
            .iter()
            .filter(|r| r.created_at >= window_start)
            .collect();

        Self {
            generated_at: now,
            window_start,
            bucket_width_secs: config.bucket_width.as_secs(),
            record_count: in_window.len(),
            timeseries: bucket_counts(in_window.iter().copied(), config.bucket_width),
            totals: sentiment_totals(in_window.iter().copied()),
            top_hashtags: top_hashtags(in_window.iter().copied(), config.top_hashtags),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

/// Count records per class in buckets of `width`.
///
/// Buckets are aligned to multiples of `width` since the Unix epoch. The
/// series is contiguous from the first to the last populated bucket; gaps
/// are zero-filled. A zero width is treated as one second.
pub fn bucket_counts<'a, I>(records: I, width: Duration) -> Vec<TimeBucket>
where
    I: IntoIterator<Item = &'a EnrichedRecord>,
{
    let width = width.as_secs().max(1) as i64;
    let mut counts: HashMap<i64, TimeBucket> = HashMap::new();

    for record in records {
        let start = record.created_at.timestamp().div_euclid(width) * width;
        counts
            .entry(start)
            .or_insert_with(|| TimeBucket::empty(epoch_secs(start)))
            .add(SentimentClass::from_compound(record.compound_score));
    }

    let (Some(&first), Some(&last)) = (counts.keys().min(), counts.keys().max()) else {
        return Vec::new();
    };

    (first..=last)
        .step_by(width as usize)
        .map(|start| {
            counts
                .remove(&start)
                .unwrap_or_else(|| TimeBucket::empty(epoch_secs(start)))
        })
        .collect()
}

/// Count records per class over the whole input.
pub fn sentiment_totals<'a, I>(records: I) -> SentimentTotals
where
    I: IntoIterator<Item = &'a EnrichedRecord>,
{
    let mut totals = SentimentTotals::default();
    for record in records {
        match SentimentClass::from_compound(record.compound_score) {
            SentimentClass::Positive => totals.positive += 1,
            SentimentClass::Neutral => totals.neutral += 1,
            SentimentClass::Negative => totals.negative += 1,
        }
        totals.total += 1;
    }
    totals
}

/// Rank hashtags by frequency, case-insensitive, keeping the top `n`.
///
/// Ties keep first-seen order.
pub fn top_hashtags<'a, I>(records: I, n: usize) -> Vec<HashtagCount>
where
    I: IntoIterator<Item = &'a EnrichedRecord>,
{
    // tag -> (count, first-seen position)
    let mut counts: HashMap<String, (u64, usize)> = HashMap::new();
    let mut seen = 0usize;

    for record in records {
        for tag in record.hashtag_list() {
            let entry = counts.entry(tag.to_lowercase()).or_insert((0, seen));
            entry.0 += 1;
            seen += 1;
        }
    }

    let mut ranked: Vec<(String, u64, usize)> = counts
        .into_iter()
        .map(|(tag, (count, first))| (tag, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(n);

    ranked
        .into_iter()
        .map(|(tag, count, _)| HashtagCount { tag, count })
        .collect()
}

fn epoch_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, secs: i64, compound: f64, hashtags: Option<&str>) -> EnrichedRecord {
        EnrichedRecord {
            id: id.to_string(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            author: "amy".to_string(),
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

    #[test]
    fn test_buckets_align_and_zero_fill() {
        let records = vec![
            record("a", 1_000, 0.5, None),
            record("b", 1_004, -0.5, None),
            record("c", 1_016, 0.0, None),
        ];

        let buckets = bucket_counts(&records, Duration::from_secs(5));
        let starts: Vec<i64> = buckets.iter().map(|b| b.start.timestamp()).collect();
        assert_eq!(starts, vec![1_000, 1_005, 1_010, 1_015]);

        assert_eq!(buckets[0].positive, 1);
        assert_eq!(buckets[0].negative, 1);
        assert_eq!(buckets[1].total(), 0);
        assert_eq!(buckets[2].total(), 0);
        assert_eq!(buckets[3].neutral, 1);
    }

    #[test]
    fn test_buckets_use_inclusive_thresholds() {
        let records = vec![
            record("p", 10, 0.05, None),
            record("n", 10, -0.05, None),
            record("z", 10, 0.049, None),
        ];
        let buckets = bucket_counts(&records, Duration::from_secs(5));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].count(SentimentClass::Positive), 1);
        assert_eq!(buckets[0].count(SentimentClass::Negative), 1);
        assert_eq!(buckets[0].count(SentimentClass::Neutral), 1);
    }

    #[test]
    fn test_totals_and_proportions() {
        let records = vec![
            record("a", 0, 0.9, None),
            record("b", 0, 0.2, None),
            record("c", 0, -0.3, None),
            record("d", 0, 0.0, None),
        ];
        let totals = sentiment_totals(&records);
        assert_eq!(totals.positive, 2);
        assert_eq!(totals.negative, 1);
        assert_eq!(totals.neutral, 1);
        assert_eq!(totals.total, 4);
        assert_eq!(totals.proportion(SentimentClass::Positive), 0.5);
        assert_eq!(SentimentTotals::default().proportion(SentimentClass::Positive), 0.0);
    }

    #[test]
    fn test_top_hashtags_case_insensitive_with_stable_ties() {
        let records = vec![
            record("a", 0, 0.0, Some("rust,Tokio")),
            record("b", 0, 0.0, Some("tokio,serde")),
            record("c", 0, 0.0, Some("RUST")),
            record("d", 0, 0.0, None),
            record("e", 0, 0.0, Some("axum")),
        ];

        let top = top_hashtags(&records, 10);
        let ranked: Vec<(&str, u64)> = top.iter().map(|h| (h.tag.as_str(), h.count)).collect();
        assert_eq!(
            ranked,
            vec![("rust", 2), ("tokio", 2), ("serde", 1), ("axum", 1)]
        );

        assert_eq!(top_hashtags(&records, 1).len(), 1);
        assert!(top_hashtags(&records, 0).is_empty());
    }

    #[test]
    fn test_snapshot_filters_window() {
        let now = Utc.timestamp_opt(10_000, 0).unwrap();
        let config = AggregateConfig::default();
        let records = vec![
            record("old", 10_000 - 601, 0.9, Some("stale")),
            record("edge", 10_000 - 600, 0.9, Some("fresh")),
            record("new", 9_999, -0.9, Some("fresh")),
        ];

        let snapshot = DashboardSnapshot::compute(&records, now, &config);
        assert_eq!(snapshot.window_start.timestamp(), 9_400);
        assert_eq!(snapshot.record_count, 2);
        assert_eq!(snapshot.totals.positive, 1);
        assert_eq!(snapshot.totals.negative, 1);
        assert_eq!(
            snapshot.top_hashtags,
            vec![HashtagCount {
                tag: "fresh".into(),
                count: 2
            }]
        );
        assert_eq!(snapshot.bucket_width_secs, 5);
    }

    #[test]
    fn test_empty_window_degrades_gracefully() {
        let now = Utc::now();
        let snapshot = DashboardSnapshot::empty(now, &AggregateConfig::default());
        assert!(snapshot.is_empty());
        assert!(snapshot.timeseries.is_empty());
        assert!(snapshot.top_hashtags.is_empty());
        assert_eq!(snapshot.totals, SentimentTotals::default());
    }
}
