//! Event source adapters.
//!
//! Each source decodes its input into [`StreamMessage`]s and hands them, one
//! at a time, to a handler supplied by the ingestion session.
//!
//! # Available Sources
//!
//! - [`HttpStreamSource`] - Long-lived authenticated HTTP filtered stream
//! - [`JsonlSource`] - Replays a captured stream from JSONL files
//!
//! # Signals
//!
//! Provider errors (including rate limits) are delivered to the handler as
//! [`StreamMessage::Error`] so the session decides how to react. Losing the
//! connection is reported by returning [`Error::Transport`](crate::Error)
//! from [`EventSource::process`].

mod http;
mod jsonl;

pub use http::{HttpStreamConfig, HttpStreamSource};
pub use jsonl::{JsonlConfig, JsonlSource};

use crate::Result;
use murmur_core::StreamMessage;

/// A source of stream messages.
pub trait EventSource {
    /// Human-readable name for this source (used in logs).
    fn name(&self) -> &'static str;

    /// Deliver messages to `handler` until the source is exhausted or the
    /// handler asks to stop.
    ///
    /// The handler returns `Ok(true)` to continue, `Ok(false)` to stop
    /// gracefully, or `Err` to abort. Lines that fail to decode are counted
    /// in [`SourceStats::parse_errors`] and never reach the handler.
    fn process<F>(&mut self, handler: F) -> Result<SourceStats>
    where
        F: FnMut(StreamMessage) -> Result<bool>;
}

/// Statistics from processing an event source.
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    /// Non-empty lines read.
    pub total_messages: usize,

    /// Lines decoded and delivered to the handler.
    pub delivered: usize,

    /// Lines that failed to decode.
    pub parse_errors: usize,

    /// Source-specific metadata.
    pub source_metadata: SourceMetadata,
}

/// Source-specific metadata.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    /// For file-based sources: number of files processed.
    pub files_processed: Option<usize>,

    /// For file-based sources: total bytes on disk.
    pub bytes_read: Option<usize>,

    /// For the HTTP source: keep-alive lines received.
    pub keep_alives: Option<usize>,
}
