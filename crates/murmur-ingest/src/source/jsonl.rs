//! JSONL replay source.
//!
//! Reads a captured stream from JSONL files (one JSON message per line),
//! optionally gzip-compressed, and replays it through the handler. Useful
//! for offline runs and for re-scoring a past capture.

use super::{EventSource, SourceMetadata, SourceStats};
use crate::{Error, Result};
use flate2::read::GzDecoder;
use murmur_core::StreamMessage;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Configuration for the JSONL source.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Input file or directory path.
    pub input: PathBuf,

    /// Replay at most this many files (after sorting).
    pub limit: Option<usize>,

    /// Progress reporting interval (lines).
    pub progress_interval: usize,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            limit: None,
            progress_interval: 10_000,
        }
    }
}

/// JSONL file replay source.
pub struct JsonlSource {
    config: JsonlConfig,
}

impl JsonlSource {
    pub fn new(config: JsonlConfig) -> Self {
        Self { config }
    }

    /// Collect files to process based on input path.
    fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let input = &self.config.input;
        let mut files = if input.is_file() {
            vec![input.clone()]
        } else if input.is_dir() {
            let mut entries: Vec<_> = fs::read_dir(input)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|path| path.is_file() && is_jsonl(path))
                .collect();

            // Sort for deterministic replay order
            entries.sort();
            entries
        } else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Input path does not exist: {}", input.display()),
            )));
        };

        if let Some(limit) = self.config.limit {
            files.truncate(limit);
        }

        Ok(files)
    }

    fn open(path: &Path) -> Result<Box<dyn BufRead>> {
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Box::new(BufReader::new(reader)))
    }

    /// Process a single file. Returns `Ok(false)` if the handler asked to stop.
    fn process_file<F>(
        &self,
        path: &Path,
        handler: &mut F,
        stats: &mut SourceStats,
    ) -> Result<bool>
    where
        F: FnMut(StreamMessage) -> Result<bool>,
    {
        let reader = Self::open(path)?;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            stats.total_messages += 1;

            let message = match StreamMessage::from_json(&line) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(
                        "{}:{}: skipping undecodable line: {}",
                        path.display(),
                        line_num + 1,
                        e
                    );
                    stats.parse_errors += 1;
                    continue;
                }
            };

            stats.delivered += 1;
            if !handler(message)? {
                tracing::debug!("Handler signaled stop");
                return Ok(false);
            }

            if stats.total_messages.is_multiple_of(self.config.progress_interval) {
                tracing::info!(
                    "Progress: {} lines, {} delivered, {} undecodable",
                    stats.total_messages,
                    stats.delivered,
                    stats.parse_errors
                );
            }
        }

        Ok(true)
    }
}

impl EventSource for JsonlSource {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn process<F>(&mut self, mut handler: F) -> Result<SourceStats>
    where
        F: FnMut(StreamMessage) -> Result<bool>,
    {
        let mut stats = SourceStats::default();
        let mut files_processed = 0usize;
        let mut bytes_read = 0usize;

        let files = self.collect_files()?;
        tracing::info!("Found {} JSONL files to replay", files.len());

        for (idx, path) in files.iter().enumerate() {
            tracing::info!("[{}/{}] Replaying: {}", idx + 1, files.len(), path.display());
            bytes_read += fs::metadata(path)?.len() as usize;

            let keep_going = self.process_file(path, &mut handler, &mut stats)?;
            files_processed += 1;
            if !keep_going {
                break;
            }
        }

        stats.source_metadata = SourceMetadata {
            files_processed: Some(files_processed),
            bytes_read: Some(bytes_read),
            ..Default::default()
        };
        Ok(stats)
    }
}

fn is_jsonl(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(name);
    name.ends_with(".jsonl") || name.ends_with(".ndjson") || name.ends_with(".json")
}
