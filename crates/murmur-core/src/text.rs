//! Text normalization for stream posts.
//!
//! Two pure operations run on every admitted post:
//!
//! - [`extract_hashtags`] pulls `#tag` tokens out of the *original* text
//! - [`clean`] strips URLs, `@mentions` and `#tags`, then normalizes whitespace
//!
//! Hashtags must be extracted before cleaning, since cleaning removes them.

use std::sync::LazyLock;

use regex::Regex;

use crate::FIELD_SEPARATOR;

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("valid hashtag regex"));

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|\s)https?://\S+").expect("valid url regex"));

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\S+").expect("valid mention regex"));

static HASHTAG_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\S+").expect("valid hashtag token regex"));

/// Extract hashtags in first-occurrence order, case preserved.
///
/// Returns `None` when the text contains no hashtags.
///
/// # Example
///
/// ```
/// use murmur_core::extract_hashtags;
///
/// let tags = extract_hashtags("Great day! #sunny #Happy");
/// assert_eq!(tags, Some(vec!["sunny".to_string(), "Happy".to_string()]));
/// assert_eq!(extract_hashtags("no tags here"), None);
/// ```
pub fn extract_hashtags(text: &str) -> Option<Vec<String>> {
    let tags: Vec<String> = HASHTAG_RE
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if tags.is_empty() { None } else { Some(tags) }
}

/// Lowercase and join hashtags into the persisted column value.
///
/// Trend aggregation is case-insensitive, so tags are lowered here rather
/// than at extraction time.
pub fn hashtags_field(tags: Option<&[String]>) -> Option<String> {
    let tags = tags?;
    if tags.is_empty() {
        return None;
    }

    Some(
        tags.iter()
            .map(|t| t.to_lowercase())
            .collect::<Vec<_>>()
            .join(FIELD_SEPARATOR),
    )
}

/// Strip URLs, mentions and hashtags, then collapse whitespace.
///
/// All removals happen before whitespace is normalized, so the gaps they
/// leave behind (and embedded newlines) fold into single spaces.
///
/// # Example
///
/// ```
/// use murmur_core::clean;
///
/// assert_eq!(clean("Great day! #sunny #happy http://x.co @bob"), "Great day!");
/// ```
pub fn clean(text: &str) -> String {
    let without_urls = URL_RE.replace_all(text, "${1}");
    let without_mentions = MENTION_RE.replace_all(&without_urls, "");
    let without_tags = HASHTAG_TOKEN_RE.replace_all(&without_mentions, "");

    without_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}
