//! Murmur stream ingestion engine.
//!
//! This crate pulls posts from an event source, enriches them (hashtags,
//! normalized text, sentiment scores) and writes them to the record store.
//!
//! # Modules
//!
//! - [`source`] - Event source adapters (live HTTP stream, JSONL replay)
//! - [`session`] - The per-session ingestion engine and its stop conditions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Event Source   │  (HTTP filtered stream, JSONL replay)
//! └────────┬────────┘
//!          │ StreamMessage
//!          ▼
//! ┌─────────────────┐
//! │  IngestSession  │  reshare filter, normalize, score, stop condition
//! └────────┬────────┘
//!          │ EnrichedRecord
//!          ▼
//! ┌─────────────────┐
//! │   RecordStore   │  SQLite, one committed row per post
//! └─────────────────┘
//! ```

pub mod error;
pub mod session;
pub mod source;

pub use error::{Error, Result};

pub use session::{IngestSession, SessionReport, SessionStats, StopReason, is_rate_limit};

pub use source::{
    EventSource, HttpStreamConfig, HttpStreamSource, JsonlConfig, JsonlSource, SourceMetadata,
    SourceStats,
};
