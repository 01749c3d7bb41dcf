//! Durable storage for enriched records.
//!
//! The ingestion engine writes through the [`RecordStore`] trait and the
//! dashboard reads through it. [`SqliteStore`] is the production backend.
//!
//! Write failures are typed so callers can tell a harmless duplicate
//! (the primary key already exists, safe to skip) from a connectivity
//! failure (nothing was committed, the session should abort).

mod schema;
mod sqlite;

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::post::EnrichedRecord;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by a [`RecordStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record with this identifier already exists.
    #[error("duplicate record: {id}")]
    DuplicateKey {
        /// Identifier of the rejected record.
        id: String,
    },

    /// The store could not be reached or failed the operation.
    #[error("store connectivity error: {0}")]
    Connectivity(String),
}

impl StoreError {
    /// Whether this failure is a duplicate primary key.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

/// Append-only record storage queryable by time.
pub trait RecordStore: Send + Sync {
    /// Create tables and indexes if they don't exist.
    fn create_schema(&self) -> StoreResult<()>;

    /// Insert one record and commit it before returning.
    fn insert(&self, record: &EnrichedRecord) -> StoreResult<()>;

    /// All records with `created_at >= since`, oldest first.
    fn query_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<EnrichedRecord>>;

    /// Administrative purge of records created before `before`.
    ///
    /// Returns the number of rows removed.
    fn purge_before(&self, before: DateTime<Utc>) -> StoreResult<usize>;

    /// Total number of stored records.
    fn count(&self) -> StoreResult<u64>;
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn create_schema(&self) -> StoreResult<()> {
        (**self).create_schema()
    }

    fn insert(&self, record: &EnrichedRecord) -> StoreResult<()> {
        (**self).insert(record)
    }

    fn query_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<EnrichedRecord>> {
        (**self).query_since(since)
    }

    fn purge_before(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        (**self).purge_before(before)
    }

    fn count(&self) -> StoreResult<u64> {
        (**self).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let dup = StoreError::DuplicateKey { id: "123".into() };
        assert!(dup.to_string().contains("123"));
        assert!(dup.is_duplicate());

        let conn = StoreError::Connectivity("disk I/O error".into());
        assert!(conn.to_string().contains("disk I/O error"));
        assert!(!conn.is_duplicate());
    }
}
