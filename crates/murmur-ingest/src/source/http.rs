//! Live HTTP filtered-stream source.
//!
//! Opens one long-lived authenticated GET against the provider's filtered
//! stream endpoint and reads newline-delimited JSON from the response body.
//!
//! # Protocol
//!
//! - Query parameters: `track` (comma-joined keywords) and `language`.
//! - `Authorization: Bearer <token>` when a token is configured.
//! - Blank lines are keep-alives and are ignored.
//! - A non-success HTTP status is delivered to the handler as
//!   [`StreamMessage::Error`] carrying the status code, so 420/429 reach the
//!   session as a rate-limit signal like any in-band error would.
//!
//! Connect failures, a dropped body and read timeouts end the run with
//! [`Error::Transport`]. There is no reconnect loop.

use super::{EventSource, SourceMetadata, SourceStats};
use crate::{Error, Result};

use futures_util::StreamExt;
use murmur_core::StreamMessage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Configuration for the HTTP stream source.
#[derive(Debug, Clone)]
pub struct HttpStreamConfig {
    /// Filtered stream endpoint.
    pub url: String,

    /// Bearer token.
    pub token: Option<String>,

    /// Keywords to track.
    pub track: Vec<String>,

    /// Language filter (e.g. `en`).
    pub language: Option<String>,

    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,

    /// Maximum silence between body chunks before the connection is considered dead.
    /// Providers send keep-alives, so this only trips on a stalled connection.
    pub read_timeout: Duration,
}

impl Default for HttpStreamConfig {
    fn default() -> Self {
        Self {
            url: "https://stream.twitter.com/1.1/statuses/filter.json".to_string(),
            token: None,
            track: Vec::new(),
            language: Some("en".to_string()),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(90),
        }
    }
}

/// Live HTTP stream source.
pub struct HttpStreamSource {
    config: HttpStreamConfig,
    /// Cleared to make the read loop exit at the next chunk.
    running: Arc<AtomicBool>,
}

impl HttpStreamSource {
    pub fn new(config: HttpStreamConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Share an external running flag (e.g. the process's Ctrl+C flag).
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Connect and stream messages to the handler.
    ///
    /// This is the async implementation that the sync `process` method calls.
    pub async fn run_async<F>(&self, mut handler: F) -> Result<SourceStats>
    where
        F: FnMut(StreamMessage) -> Result<bool>,
    {
        if self.config.track.is_empty() {
            return Err(Error::Config("at least one track keyword is required".into()));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .build()?;

        let track = self.config.track.join(murmur_core::FIELD_SEPARATOR);
        let mut query = vec![("track", track.as_str())];
        if let Some(language) = self.config.language.as_deref() {
            query.push(("language", language));
        }

        let mut request = client.get(&self.config.url).query(&query);
        if let Some(token) = self.config.token.as_deref() {
            request = request.bearer_auth(token);
        }

        tracing::info!(
            "Connecting to {} (track={}, language={})",
            self.config.url,
            track,
            self.config.language.as_deref().unwrap_or("any")
        );

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("connect failed: {}", e)))?;

        let mut stats = SourceStats::default();
        let mut keep_alives = 0usize;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("HTTP error").to_string()
            } else {
                body.trim().to_string()
            };
            tracing::warn!("Stream endpoint returned HTTP {}: {}", code, message);

            stats.delivered += 1;
            handler(StreamMessage::Error { code, message })?;
            return Ok(stats);
        }

        tracing::info!("Connected, streaming");

        let mut body = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::with_capacity(16 * 1024);
        let mut server_closed = false;

        'read: while self.is_running() {
            let chunk = match tokio::time::timeout(self.config.read_timeout, body.next()).await {
                Err(_) => {
                    return Err(Error::Transport(format!(
                        "no data for {}s",
                        self.config.read_timeout.as_secs()
                    )));
                }
                Ok(None) => {
                    tracing::info!("Stream closed by server");
                    server_closed = true;
                    break;
                }
                Ok(Some(Err(e))) => return Err(Error::Transport(format!("read failed: {}", e))),
                Ok(Some(Ok(chunk))) => chunk,
            };

            buf.extend_from_slice(&chunk);

            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                if !self.dispatch_line(&line, &mut handler, &mut stats, &mut keep_alives)? {
                    break 'read;
                }
            }
        }

        // Lines still buffered after the handler stopped are never delivered.
        // An unterminated tail is only a complete message if the server closed cleanly.
        if server_closed && !buf.is_empty() {
            self.dispatch_line(&buf, &mut handler, &mut stats, &mut keep_alives)?;
        }

        stats.source_metadata = SourceMetadata {
            keep_alives: Some(keep_alives),
            ..Default::default()
        };
        Ok(stats)
    }

    /// Decode one line and pass it on. Returns `Ok(false)` if the handler asked to stop.
    fn dispatch_line<F>(
        &self,
        raw: &[u8],
        handler: &mut F,
        stats: &mut SourceStats,
        keep_alives: &mut usize,
    ) -> Result<bool>
    where
        F: FnMut(StreamMessage) -> Result<bool>,
    {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            *keep_alives += 1;
            return Ok(true);
        }

        stats.total_messages += 1;
        match StreamMessage::from_json(line) {
            Ok(message) => {
                stats.delivered += 1;
                handler(message)
            }
            Err(e) => {
                tracing::warn!("Skipping undecodable stream line: {}", e);
                stats.parse_errors += 1;
                Ok(true)
            }
        }
    }
}

impl EventSource for HttpStreamSource {
    fn name(&self) -> &'static str {
        "http"
    }

    fn process<F>(&mut self, handler: F) -> Result<SourceStats>
    where
        F: FnMut(StreamMessage) -> Result<bool>,
    {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Io)?;

        rt.block_on(self.run_async(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use std::collections::HashMap;

    const POST: &str = r#"{"id_str":"1","created_at":"Wed Oct 10 20:19:24 +0000 2018","user":{"screen_name":"bob"},"text":"hello"}"#;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/stream", addr)
    }

    fn config(url: String) -> HttpStreamConfig {
        HttpStreamConfig {
            url,
            token: Some("secret".into()),
            track: vec!["rust".into(), "tokio".into()],
            read_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_streams_lines_and_ignores_keep_alives() {
        let app = Router::new().route(
            "/stream",
            get(
                |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                    assert_eq!(headers.get("authorization").unwrap(), "Bearer secret");
                    assert_eq!(params.get("track").map(String::as_str), Some("rust,tokio"));
                    assert_eq!(params.get("language").map(String::as_str), Some("en"));
                    format!("\r\n{}\r\n\r\nnot json\r\n{{\"limit\":{{\"track\":4}}}}\r\n", POST)
                },
            ),
        );
        let source = HttpStreamSource::new(config(serve(app).await));

        let mut seen = Vec::new();
        let stats = source
            .run_async(|m| {
                seen.push(m);
                Ok(true)
            })
            .await
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], StreamMessage::Post(_)));
        assert_eq!(seen[1], StreamMessage::Limit { undelivered: 4 });
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.source_metadata.keep_alives, Some(2));
    }

    #[tokio::test]
    async fn test_http_status_is_delivered_as_error() {
        let app = Router::new().route(
            "/stream",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests") }),
        );
        let source = HttpStreamSource::new(config(serve(app).await));

        let mut seen = Vec::new();
        source
            .run_async(|m| {
                seen.push(m);
                Ok(true)
            })
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![StreamMessage::Error {
                code: 429,
                message: "Too Many Requests".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_handler_stop_discards_buffered_lines() {
        let body = format!("{}\r\n{}\r\n{}\r\nunterminated", POST, POST, POST);
        let app = Router::new().route(
            "/stream",
            get(move || {
                let body = body.clone();
                async move { body }
            }),
        );
        let source = HttpStreamSource::new(config(serve(app).await));

        let mut calls = 0;
        let stats = source
            .run_async(|_| {
                calls += 1;
                Ok(false)
            })
            .await
            .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.parse_errors, 0);
    }

    #[tokio::test]
    async fn test_unterminated_tail_delivered_on_clean_close() {
        let app = Router::new().route("/stream", get(|| async { format!("\r\n{}", POST) }));
        let source = HttpStreamSource::new(config(serve(app).await));

        let mut seen = Vec::new();
        source
            .run_async(|m| {
                seen.push(m);
                Ok(true)
            })
            .await
            .unwrap();

        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], StreamMessage::Post(_)));
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpStreamSource::new(config(format!("http://{}/stream", addr)));
        let err = source.run_async(|_| Ok(true)).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_requires_track_keywords() {
        let source = HttpStreamSource::new(HttpStreamConfig::default());
        let err = source.run_async(|_| Ok(true)).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
