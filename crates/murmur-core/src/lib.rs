//! Core types, normalization, scoring and storage for the Murmur pipeline.
//!
//! This crate provides:
//! - The post data model (raw stream events and enriched records)
//! - Text normalization (hashtag extraction, URL/mention/hashtag stripping)
//! - A lexicon-based sentiment scorer behind the [`SentimentScorer`] trait
//! - The SQLite-backed [`RecordStore`]
//! - Window aggregation for the dashboard
//! - Prometheus metrics helpers
//! - Shared error types

pub mod aggregate;
mod error;
pub mod metrics;
pub mod post;
pub mod sentiment;
pub mod store;
pub mod text;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Separator used when persisting multi-valued columns (hashtags, search terms).
pub const FIELD_SEPARATOR: &str = ",";

pub use aggregate::{
    AggregateConfig, DashboardSnapshot, HashtagCount, SentimentTotals, TimeBucket,
};
pub use error::{Error, Result};
pub use post::{EnrichedRecord, PostText, RawEvent, StreamMessage};
pub use sentiment::{LexiconScorer, PolarityScores, SentimentClass, SentimentScorer};
pub use store::{RecordStore, SqliteStore, StoreError, StoreResult};
pub use text::{clean, extract_hashtags, hashtags_field};
