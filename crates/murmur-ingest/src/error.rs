//! Error types for the ingestion engine.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// The record store failed a write (connectivity; duplicates never surface here).
    #[error("Store error: {0}")]
    Store(#[from] murmur_core::StoreError),

    /// Payload decoding error.
    #[error("Decode error: {0}")]
    Core(#[from] murmur_core::Error),

    /// The provider reported an error that is not a rate limit.
    #[error("Source error {code}: {message}")]
    Source { code: u16, message: String },

    /// Connect failure, dropped connection or read timeout.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error means the connection to the source was lost.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
