//! Stream payload decoding and the persisted record type.
//!
//! The upstream stream delivers one JSON object per line. Most lines are
//! posts, but the same channel carries out-of-band control messages
//! (errors, disconnect notices, undelivered-count notices). Everything is
//! decoded into the [`StreamMessage`] tagged union at the boundary.
//!
//! Post text comes in two shapes depending on the payload version: an
//! extended field (`extended_tweet.full_text` or top-level `full_text`)
//! and the classic, possibly truncated, `text` field. [`PostText`] records
//! which one was found; the extended form always wins.

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sentiment::PolarityScores;

/// Classic streaming-API timestamp layout, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const CLASSIC_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Post text as found in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostText {
    /// Full text from the extended field.
    Extended(String),
    /// Text from the classic field (may be truncated).
    Classic(String),
}

impl PostText {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Extended(s) | Self::Classic(s) => s,
        }
    }
}

/// A post as delivered by the event source. Exists only in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Stream-assigned identifier; becomes the record's primary key.
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    /// `None` when neither text shape was present.
    pub text: Option<PostText>,
    pub retweet_count: u32,
    pub favorite_count: u32,
    /// Set when this event reshares another post.
    pub is_reshare: bool,
}

impl RawEvent {
    /// The best available full text: extended if present, classic otherwise.
    pub fn full_text(&self) -> Option<&str> {
        self.text.as_ref().map(PostText::as_str)
    }
}

/// A decoded line from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// A post.
    Post(Box<RawEvent>),
    /// An error reported in-band by the provider.
    Error { code: u16, message: String },
    /// The provider is closing the stream.
    Disconnect { code: u16, reason: String },
    /// Number of matching posts the provider withheld since the connection opened.
    Limit { undelivered: u64 },
}

impl StreamMessage {
    /// Decode a single JSON line.
    pub fn from_json(line: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(line)?;

        if let Some(errors) = value.get("errors") {
            let errors: Vec<WireError> = serde_json::from_value(errors.clone())?;
            let first = errors
                .into_iter()
                .next()
                .ok_or_else(|| Error::invalid_field("errors", "empty error list"))?;
            return Ok(Self::Error {
                code: first.code,
                message: first.message,
            });
        }

        if let Some(disconnect) = value.get("disconnect") {
            let d: WireDisconnect = serde_json::from_value(disconnect.clone())?;
            return Ok(Self::Disconnect {
                code: d.code,
                reason: d.reason,
            });
        }

        if let Some(limit) = value.get("limit") {
            let l: WireLimit = serde_json::from_value(limit.clone())?;
            return Ok(Self::Limit {
                undelivered: l.track,
            });
        }

        let post: WirePost = serde_json::from_value(value)?;
        Ok(Self::Post(Box::new(post.try_into()?)))
    }
}

/// An enriched, scored post as persisted in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    /// Normalized text (URLs, mentions and hashtags stripped).
    pub text: String,
    pub retweet_count: u32,
    pub favorite_count: u32,
    pub neg_score: f64,
    pub neu_score: f64,
    pub pos_score: f64,
    pub compound_score: f64,
    /// Lowercase hashtags joined with `,`, or `None` when the post had none.
    pub hashtags: Option<String>,
    /// Tracked keywords active when the post was captured, joined with `,`.
    pub search_terms: String,
}

impl EnrichedRecord {
    /// Build a record from a source event and its derived fields.
    pub fn new(
        event: &RawEvent,
        text: String,
        hashtags: Option<String>,
        scores: PolarityScores,
        search_terms: &str,
    ) -> Self {
        Self {
            id: event.id.clone(),
            created_at: event.created_at,
            author: event.author.clone(),
            text,
            retweet_count: event.retweet_count,
            favorite_count: event.favorite_count,
            neg_score: scores.neg,
            neu_score: scores.neu,
            pos_score: scores.pos,
            compound_score: scores.compound,
            hashtags,
            search_terms: search_terms.to_string(),
        }
    }

    /// The record's hashtags as individual lowercase tags.
    pub fn hashtag_list(&self) -> impl Iterator<Item = &str> {
        self.hashtags
            .as_deref()
            .unwrap_or("")
            .split(crate::FIELD_SEPARATOR)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct WireError {
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireDisconnect {
    code: u16,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct WireLimit {
    #[serde(default)]
    track: u64,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    screen_name: String,
}

#[derive(Debug, Deserialize)]
struct WireExtended {
    full_text: String,
}

#[derive(Debug, Deserialize)]
struct WirePost {
    #[serde(default)]
    id_str: Option<String>,
    #[serde(default)]
    id: Option<u64>,
    created_at: String,
    user: WireUser,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    full_text: Option<String>,
    #[serde(default)]
    extended_tweet: Option<WireExtended>,
    #[serde(default)]
    retweet_count: u32,
    #[serde(default)]
    favorite_count: u32,
    #[serde(default)]
    retweeted_status: Option<IgnoredAny>,
}

impl TryFrom<WirePost> for RawEvent {
    type Error = Error;

    fn try_from(wire: WirePost) -> Result<Self> {
        let id = match (wire.id_str, wire.id) {
            (Some(s), _) if !s.is_empty() => s,
            (_, Some(n)) => n.to_string(),
            _ => return Err(Error::invalid_field("id_str", "missing post identifier")),
        };

        let text = match (wire.extended_tweet, wire.full_text, wire.text) {
            (Some(ext), _, _) => Some(PostText::Extended(ext.full_text)),
            (None, Some(full), _) => Some(PostText::Extended(full)),
            (None, None, Some(text)) => Some(PostText::Classic(text)),
            (None, None, None) => None,
        };

        Ok(Self {
            id,
            created_at: parse_created_at(&wire.created_at)?,
            author: wire.user.screen_name,
            text,
            retweet_count: wire.retweet_count,
            favorite_count: wire.favorite_count,
            is_reshare: wire.retweeted_status.is_some(),
        })
    }
}

/// Parse a post timestamp in either the classic layout or RFC 3339.
pub fn parse_created_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(raw, CLASSIC_TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            Error::invalid_field("created_at", format!("unrecognized timestamp '{}'", raw))
        })
}
