//! The ingestion session: per-message enrichment and the stop condition.
//!
//! An [`IngestSession`] owns all of its state (counter, target, search
//! terms, store, scorer), so independent sessions can run side by side.
//! For each post it:
//!
//! 1. stops if the target has been reached
//! 2. drops reshares without advancing the counter
//! 3. selects the full text (extended, then classic) or skips the event
//! 4. extracts hashtags from the original text
//! 5. cleans and scores the text
//! 6. writes the enriched record and advances the counter
//!
//! Reaching the target after a write stops the session immediately rather
//! than waiting for the next event.

use crate::source::EventSource;
use crate::{Error, Result};
use metrics::{counter, gauge};
use murmur_core::{
    EnrichedRecord, RawEvent, RecordStore, SentimentScorer, StoreError, StreamMessage,
    hashtags_field,
};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Provider error codes that mean "slow down".
///
/// 420 and 429 arrive as HTTP statuses or in-band codes; 88 is the in-band
/// rate-limit code.
const RATE_LIMIT_CODES: &[u16] = &[88, 420, 429];

/// Log progress every N records written.
const PROGRESS_INTERVAL: u64 = 100;

/// Whether a provider error code is a rate-limit signal.
pub fn is_rate_limit(code: u16) -> bool {
    RATE_LIMIT_CODES.contains(&code)
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `events_processed` reached `target_count`.
    TargetReached,
    /// The provider signalled a rate limit.
    RateLimited,
    /// The connection failed or dropped.
    TransportError(String),
    /// A finite source ran out of messages.
    StreamEnded,
    /// The operator asked the process to stop.
    Shutdown,
}

impl StopReason {
    /// Whether the binary should exit with a failure status.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TransportError(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target reached"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::TransportError(desc) => write!(f, "transport error: {}", desc),
            Self::StreamEnded => write!(f, "stream ended"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Posts that reached processing (after the stop check).
    pub events_seen: u64,
    /// Records committed to the store.
    pub records_written: u64,
    /// Reshares dropped.
    pub reshares_skipped: u64,
    /// Posts without usable text, plus lines the source could not decode.
    pub malformed: u64,
    /// Records the store rejected as duplicates.
    pub duplicates: u64,
    /// Informational provider notices (undelivered counts).
    pub notices: u64,
}

/// Outcome of [`IngestSession::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub stop_reason: StopReason,
    pub stats: SessionStats,
}

/// Whether the source should keep delivering.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop(StopReason),
}

/// Per-session ingestion context.
pub struct IngestSession<S, C> {
    store: S,
    scorer: C,
    target_count: u64,
    search_terms: String,
    events_processed: u64,
    running: Arc<AtomicBool>,
    stats: SessionStats,
}

impl<S: RecordStore, C: SentimentScorer> IngestSession<S, C> {
    /// Create a session that stops after `target_count` records.
    pub fn new(store: S, scorer: C, target_count: u64, search_terms: &[String]) -> Self {
        Self {
            store,
            scorer,
            target_count,
            search_terms: search_terms.join(murmur_core::FIELD_SEPARATOR),
            events_processed: 0,
            running: Arc::new(AtomicBool::new(true)),
            stats: SessionStats::default(),
        }
    }

    /// Share an external running flag; clearing it ends the session with
    /// [`StopReason::Shutdown`] at the next message.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn target_count(&self) -> u64 {
        self.target_count
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drive `source` until a stop condition is met.
    ///
    /// Rate limits, transport failures, exhaustion and shutdown end the
    /// session normally with a [`StopReason`]. Store connectivity failures
    /// and non-rate-limit provider errors are returned as `Err`.
    pub fn run<E: EventSource>(&mut self, source: &mut E) -> Result<SessionReport> {
        tracing::info!(
            "Starting {} session: target={}, track={}",
            source.name(),
            self.target_count,
            self.search_terms
        );
        gauge!("ingest_running").set(1.0);

        let mut stop: Option<StopReason> = None;
        let result = source.process(|message| match self.handle(message)? {
            Flow::Continue => Ok(true),
            Flow::Stop(reason) => {
                stop = Some(reason);
                Ok(false)
            }
        });

        gauge!("ingest_running").set(0.0);

        match result {
            Ok(source_stats) => {
                let undecodable = source_stats.parse_errors as u64;
                self.stats.malformed += undecodable;
                counter!("ingest_events_malformed_total").increment(undecodable);
            }
            Err(Error::Transport(desc)) => {
                tracing::error!("Transport failure: {}", desc);
                stop.get_or_insert(StopReason::TransportError(desc));
            }
            Err(e) => return Err(e),
        }

        let stop_reason = stop.unwrap_or_else(|| {
            if self.running.load(Ordering::SeqCst) {
                StopReason::StreamEnded
            } else {
                StopReason::Shutdown
            }
        });

        tracing::info!(
            "Session ended ({}): {} records written",
            stop_reason,
            self.stats.records_written
        );

        Ok(SessionReport {
            stop_reason,
            stats: self.stats.clone(),
        })
    }

    fn handle(&mut self, message: StreamMessage) -> Result<Flow> {
        if self.events_processed >= self.target_count {
            return Ok(Flow::Stop(StopReason::TargetReached));
        }
        if !self.running.load(Ordering::SeqCst) {
            return Ok(Flow::Stop(StopReason::Shutdown));
        }

        match message {
            StreamMessage::Post(event) => self.process_event(&event),
            StreamMessage::Error { code, message } if is_rate_limit(code) => {
                tracing::info!("Rate limited by provider ({}): {}", code, message);
                Ok(Flow::Stop(StopReason::RateLimited))
            }
            StreamMessage::Error { code, message } => {
                tracing::error!("Provider error {}: {}", code, message);
                Err(Error::Source { code, message })
            }
            StreamMessage::Disconnect { code, reason } => {
                tracing::warn!("Provider disconnected ({}): {}", code, reason);
                Ok(Flow::Stop(StopReason::TransportError(format!(
                    "disconnected by provider ({}): {}",
                    code, reason
                ))))
            }
            StreamMessage::Limit { undelivered } => {
                tracing::info!("Provider withheld {} matching posts", undelivered);
                self.stats.notices += 1;
                Ok(Flow::Continue)
            }
        }
    }

    fn process_event(&mut self, event: &RawEvent) -> Result<Flow> {
        self.stats.events_seen += 1;
        counter!("ingest_events_total").increment(1);

        if event.is_reshare {
            tracing::debug!("Skipping reshare {}", event.id);
            self.stats.reshares_skipped += 1;
            counter!("ingest_reshares_skipped_total").increment(1);
            return Ok(Flow::Continue);
        }

        let Some(text) = event.full_text() else {
            tracing::warn!("Skipping post {} with no text", event.id);
            self.stats.malformed += 1;
            counter!("ingest_events_malformed_total").increment(1);
            return Ok(Flow::Continue);
        };

        let record = self.enrich(event, text);

        match self.store.insert(&record) {
            Ok(()) => {}
            Err(StoreError::DuplicateKey { id }) => {
                tracing::warn!("Skipping duplicate post {}", id);
                self.stats.duplicates += 1;
                counter!("ingest_records_duplicate_total").increment(1);
                return Ok(Flow::Continue);
            }
            Err(e) => {
                tracing::error!("Store write failed for {}: {}", record.id, e);
                return Err(e.into());
            }
        }

        self.events_processed += 1;
        self.stats.records_written += 1;
        counter!("ingest_records_written_total").increment(1);
        tracing::debug!(
            "Stored {} (compound={:.4}, hashtags={})",
            record.id,
            record.compound_score,
            record.hashtags.as_deref().unwrap_or("-")
        );

        if self.events_processed.is_multiple_of(PROGRESS_INTERVAL) {
            tracing::info!(
                "Progress: {}/{} records",
                self.events_processed,
                self.target_count
            );
        }

        if self.events_processed >= self.target_count {
            return Ok(Flow::Stop(StopReason::TargetReached));
        }
        Ok(Flow::Continue)
    }

    fn enrich(&self, event: &RawEvent, text: &str) -> EnrichedRecord {
        let tags = murmur_core::extract_hashtags(text);
        let hashtags = hashtags_field(tags.as_deref());
        let cleaned = murmur_core::clean(text);
        let scores = self.scorer.polarity_scores(&cleaned);

        EnrichedRecord::new(event, cleaned, hashtags, scores, &self.search_terms)
    }
}
