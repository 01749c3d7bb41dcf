//! SQLite-backed record store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, ffi, params};

use super::schema;
use super::{RecordStore, StoreError, StoreResult};
use crate::post::EnrichedRecord;

const INSERT_SQL: &str = "INSERT INTO posts (
        id, created_at, author, text, retweet_count, favorite_count,
        neg_score, neu_score, pos_score, compound_score, hashtags, search_terms
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

const SELECT_SINCE_SQL: &str = "SELECT
        id, created_at, author, text, retweet_count, favorite_count,
        neg_score, neu_score, pos_score, compound_score, hashtags, search_terms
    FROM posts
    WHERE created_at >= ?1
    ORDER BY created_at ASC, id ASC";

/// Record store persisted in a single SQLite database file.
///
/// Thread-safe: the connection is guarded by a mutex, so one store can be
/// shared via `Arc<SqliteStore>`. Each insert runs in autocommit mode and is
/// durable when `insert` returns.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open or create a store at the given path and initialize the schema.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use murmur_core::{RecordStore, SqliteStore};
    ///
    /// let store = SqliteStore::open("./data/murmur.db")?;
    /// println!("{} records", store.count()?);
    /// # Ok::<(), murmur_core::StoreError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        tracing::info!("Opening record store at {}", path.display());

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connectivity(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(connectivity("open database"))?;

        // WAL lets the dashboard read while ingestion writes; FULL sync makes
        // every autocommit insert durable before it returns.
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA busy_timeout=5000;",
        )
        .map_err(connectivity("set PRAGMA"))?;

        let store = Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        };
        store.create_schema()?;

        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(connectivity("open in-memory database"))?;

        let store = Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        };
        store.create_schema()?;

        Ok(store)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch a single record by identifier.
    pub fn get(&self, id: &str) -> StoreResult<Option<EnrichedRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT
                id, created_at, author, text, retweet_count, favorite_count,
                neg_score, neu_score, pos_score, compound_score, hashtags, search_terms
            FROM posts WHERE id = ?1",
            [id],
            row_to_record,
        )
        .optional()
        .map_err(connectivity("fetch record"))
    }
}

impl RecordStore for SqliteStore {
    fn create_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock();
        let previous = schema::init_schema(&conn).map_err(connectivity("init schema"))?;
        if previous < schema::SCHEMA_VERSION {
            tracing::info!(
                "Initialized record store schema v{} (was v{})",
                schema::SCHEMA_VERSION,
                previous
            );
        }
        Ok(())
    }

    fn insert(&self, record: &EnrichedRecord) -> StoreResult<()> {
        let conn = self.conn.lock();
        let result = conn.execute(
            INSERT_SQL,
            params![
                record.id,
                record.created_at.timestamp(),
                record.author,
                record.text,
                record.retweet_count,
                record.favorite_count,
                record.neg_score,
                record.neu_score,
                record.pos_score,
                record.compound_score,
                record.hashtags,
                record.search_terms,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::DuplicateKey {
                id: record.id.clone(),
            }),
            Err(e) => Err(StoreError::Connectivity(format!("insert failed: {}", e))),
        }
    }

    fn query_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<EnrichedRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(SELECT_SINCE_SQL)
            .map_err(connectivity("prepare window query"))?;

        let rows = stmt
            .query_map([since.timestamp()], row_to_record)
            .map_err(connectivity("run window query"))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(connectivity("read window rows"))
    }

    fn purge_before(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM posts WHERE created_at < ?1",
                [before.timestamp()],
            )
            .map_err(connectivity("purge records"))?;

        tracing::info!("Purged {} records created before {}", removed, before);
        Ok(removed)
    }

    fn count(&self) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM posts", [], |row| row.get(0))
            .map_err(connectivity("count records"))?;
        Ok(count.max(0) as u64)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<EnrichedRecord> {
    let created_secs: i64 = row.get(1)?;
    let created_at = DateTime::from_timestamp(created_secs, 0).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(1, created_secs)
    })?;

    Ok(EnrichedRecord {
        id: row.get(0)?,
        created_at,
        author: row.get(2)?,
        text: row.get(3)?,
        retweet_count: row.get(4)?,
        favorite_count: row.get(5)?,
        neg_score: row.get(6)?,
        neu_score: row.get(7)?,
        pos_score: row.get(8)?,
        compound_score: row.get(9)?,
        hashtags: row.get(10)?,
        search_terms: row.get(11)?,
    })
}

fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

fn connectivity(action: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |e| StoreError::Connectivity(format!("failed to {}: {}", action, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn record(id: &str, secs: i64) -> EnrichedRecord {
        EnrichedRecord {
            id: id.to_string(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            author: "bob".to_string(),
            text: "Great day!".to_string(),
            retweet_count: 1,
            favorite_count: 2,
            neg_score: 0.0,
            neu_score: 0.4,
            pos_score: 0.6,
            compound_score: 0.66,
            hashtags: Some("sunny,happy".to_string()),
            search_terms: "weather".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = record("1", 1_700_000_000);
        store.insert(&r).unwrap();

        assert_eq!(store.get("1").unwrap(), Some(r));
        assert_eq!(store.get("missing").unwrap(), None);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_typed() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&record("123", 1_700_000_000)).unwrap();

        let err = store.insert(&record("123", 1_700_000_500)).unwrap_err();
        assert!(err.is_duplicate());
        assert!(matches!(err, StoreError::DuplicateKey { ref id } if id == "123"));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_query_since_filters_and_orders() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&record("late", 1_700_000_300)).unwrap();
        store.insert(&record("old", 1_700_000_000)).unwrap();
        store.insert(&record("edge", 1_700_000_100)).unwrap();

        let since = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let ids: Vec<String> = store
            .query_since(since)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["edge", "late"]);
    }

    #[test]
    fn test_query_empty_window() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = store.query_since(Utc::now() - Duration::minutes(10)).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_null_hashtags_and_emoji_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = EnrichedRecord {
            text: "so good 😍🔥 ✨".to_string(),
            hashtags: None,
            ..record("emoji", 1_700_000_000)
        };
        store.insert(&r).unwrap();
        assert_eq!(store.get("emoji").unwrap(), Some(r));
    }

    #[test]
    fn test_purge_before() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&record("a", 100)).unwrap();
        store.insert(&record("b", 200)).unwrap();
        store.insert(&record("c", 300)).unwrap();

        let removed = store.purge_before(Utc.timestamp_opt(250, 0).unwrap()).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("murmur.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&record("1", 1_700_000_000)).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.insert(&record("1", 1_700_000_000)).unwrap_err().is_duplicate());
    }

    #[test]
    fn test_shared_through_arc() {
        let store = std::sync::Arc::new(SqliteStore::open_in_memory().unwrap());
        let writer = std::sync::Arc::clone(&store);
        writer.insert(&record("1", 1_700_000_000)).unwrap();
        assert_eq!(RecordStore::count(&store).unwrap(), 1);
    }
}
