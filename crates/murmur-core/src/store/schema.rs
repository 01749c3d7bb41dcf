//! SQLite schema for the record store.

use rusqlite::{Connection, Result};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
///
/// Creates all tables if they don't exist and records the schema version.
/// Returns the version found on disk before initialization (0 for a fresh
/// database).
pub fn init_schema(conn: &Connection) -> Result<i32> {
    let current_version = get_schema_version(conn)?;

    if current_version < SCHEMA_VERSION {
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(current_version)
}

/// Get the current schema version (0 if not initialized).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

/// Create all tables for a fresh database.
///
/// Text columns are SQLite TEXT, which is UTF-8 end to end, so pictographic
/// characters round-trip without any connection-level charset setup.
fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per enriched post; id is the upstream identifier
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY NOT NULL,
            created_at INTEGER NOT NULL,
            author TEXT NOT NULL,
            text TEXT NOT NULL,
            retweet_count INTEGER NOT NULL DEFAULT 0,
            favorite_count INTEGER NOT NULL DEFAULT 0,
            neg_score REAL NOT NULL,
            neu_score REAL NOT NULL,
            pos_score REAL NOT NULL,
            compound_score REAL NOT NULL,
            hashtags TEXT,
            search_terms TEXT NOT NULL
        );

        -- Sliding-window queries filter on created_at
        CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_init_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(init_schema(&conn).unwrap(), 0);
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'posts'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(init_schema(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
