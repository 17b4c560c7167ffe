//! Shared SQLite handle
//!
//! One connection guarded by a mutex, cloned cheaply into every component
//! that needs storage. The lock is held only for the duration of a single
//! statement or transaction and never across an `.await`.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::initialize_schema;
use rusqlite::{Connection, OptionalExtension, Params, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Transactional database handle
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database file and initializes the schema
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;
        tracing::debug!("Opened database at {}", path.display());

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Runs `f` against the connection outside of any explicit transaction
    pub fn with_conn<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StorageError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside a transaction
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StorageError::from)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(StorageError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Executes a single write statement, returning the number of changed rows
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> StorageResult<usize> {
        let conn = self.lock()?;
        Ok(conn.execute(sql, params)?)
    }

    /// Point read: maps the first row, or returns `None` when there is none
    pub fn fetch_one<T, P, F>(&self, sql: &str, params: P, map: F) -> StorageResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        Ok(conn.query_row(sql, params, map).optional()?)
    }

    /// Bulk read: maps every row
    pub fn fetch_all<T, P, F>(&self, sql: &str, params: P, map: F) -> StorageResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn count_sources(db: &Database) -> i64 {
        db.fetch_one("SELECT COUNT(*) FROM sources", [], |row| row.get(0))
            .unwrap()
            .unwrap()
    }

    fn insert_source(conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO sources (type, config, created_at) VALUES (?1, '{}', ?2)",
            params!["web", "2024-01-01T00:00:00.000000Z"],
        )
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = Database::open_in_memory().unwrap();

        let result: StorageResult<()> = db.transaction(|conn| {
            insert_source(conn)?;
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(count_sources(&db), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let db = Database::open_in_memory().unwrap();

        let result: StorageResult<()> = db.transaction(|conn| {
            insert_source(conn)?;
            Err(StorageError::Corrupt("abort".to_string()))
        });

        assert!(matches!(result, Err(StorageError::Corrupt(_))));
        assert_eq!(count_sources(&db), 0);
    }

    #[test]
    fn test_fetch_one_none_when_no_rows() {
        let db = Database::open_in_memory().unwrap();
        let row: Option<i64> = db
            .fetch_one("SELECT id FROM sources WHERE id = ?1", [42], |row| row.get(0))
            .unwrap();
        assert_eq!(row, None);
    }

    #[test]
    fn test_fetch_all_and_execute() {
        let db = Database::open_in_memory().unwrap();
        for _ in 0..3 {
            db.execute(
                "INSERT INTO sources (type, config, created_at) VALUES ('web', '{}', 'now')",
                [],
            )
            .unwrap();
        }

        let ids: Vec<i64> = db
            .fetch_all("SELECT id FROM sources ORDER BY id", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_clones_share_connection() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();

        other
            .with_conn(|conn| insert_source(conn).map_err(StorageError::from))
            .unwrap();

        assert_eq!(count_sources(&db), 1);
    }
}
