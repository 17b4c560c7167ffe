//! Source repository

use crate::storage::{format_timestamp, json_column, timestamp_column, Source, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

const SOURCE_COLUMNS: &str = "id, type, name, config, created_at";

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        source_type: row.get(1)?,
        name: row.get(2)?,
        config: json_column(row, 3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

/// Repository for ingestion sources
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceRepository;

impl SourceRepository {
    pub fn new() -> Self {
        Self
    }

    /// Inserts a new source and returns the stored record
    ///
    /// # Arguments
    ///
    /// * `conn` - Connection (usually inside a transaction)
    /// * `source_type` - Type tag such as "web"
    /// * `name` - Optional display name
    /// * `config` - Type-specific configuration
    pub fn create(
        &self,
        conn: &Connection,
        source_type: &str,
        name: Option<&str>,
        config: &Value,
    ) -> StorageResult<Source> {
        let config = serde_json::to_string(config)?;
        let sql = format!(
            "INSERT INTO sources (type, name, config, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {}",
            SOURCE_COLUMNS
        );

        let source = conn.query_row(
            &sql,
            params![source_type, name, config, format_timestamp(Utc::now())],
            source_from_row,
        )?;

        tracing::debug!("Created source {} (type {})", source.id, source.source_type);
        Ok(source)
    }

    pub fn get(&self, conn: &Connection, source_id: i64) -> StorageResult<Option<Source>> {
        let sql = format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS);
        Ok(conn
            .query_row(&sql, params![source_id], source_from_row)
            .optional()?)
    }

    pub fn list(&self, conn: &Connection) -> StorageResult<Vec<Source>> {
        let sql = format!("SELECT {} FROM sources ORDER BY id", SOURCE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    /// Updates name and/or config, leaving `None` fields untouched
    pub fn update(
        &self,
        conn: &Connection,
        source_id: i64,
        name: Option<&str>,
        config: Option<&Value>,
    ) -> StorageResult<Option<Source>> {
        let config = config.map(serde_json::to_string).transpose()?;
        let sql = format!(
            "UPDATE sources SET name = COALESCE(?2, name), config = COALESCE(?3, config)
             WHERE id = ?1
             RETURNING {}",
            SOURCE_COLUMNS
        );

        Ok(conn
            .query_row(&sql, params![source_id, name, config], source_from_row)
            .optional()?)
    }

    /// Deletes a source, returning the removed record
    pub fn delete(&self, conn: &Connection, source_id: i64) -> StorageResult<Option<Source>> {
        let sql = format!(
            "DELETE FROM sources WHERE id = ?1 RETURNING {}",
            SOURCE_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![source_id], source_from_row)
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use serde_json::json;

    #[test]
    fn test_create_get_list() {
        let db = Database::open_in_memory().unwrap();
        let repo = SourceRepository::new();
        let config = json!({"type": "web", "start_url": "https://example.com/"});

        let created = db
            .with_conn(|conn| repo.create(conn, "web", Some("Example"), &config))
            .unwrap();
        assert_eq!(created.source_type, "web");
        assert_eq!(created.name.as_deref(), Some("Example"));
        assert_eq!(created.config, config);

        let fetched = db
            .with_conn(|conn| repo.get(conn, created.id))
            .unwrap()
            .unwrap();
        assert_eq!(fetched, created);

        db.with_conn(|conn| repo.create(conn, "upload", None, &json!({})))
            .unwrap();
        let all = db.with_conn(|conn| repo.list(conn)).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].name, None);
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let repo = SourceRepository::new();
        let config = json!({"start_url": "https://example.com/"});
        let source = db
            .with_conn(|conn| repo.create(conn, "web", Some("Before"), &config))
            .unwrap();

        let renamed = db
            .with_conn(|conn| repo.update(conn, source.id, Some("After"), None))
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name.as_deref(), Some("After"));
        assert_eq!(renamed.config, config);

        let new_config = json!({"start_url": "https://example.org/"});
        let reconfigured = db
            .with_conn(|conn| repo.update(conn, source.id, None, Some(&new_config)))
            .unwrap()
            .unwrap();
        assert_eq!(reconfigured.name.as_deref(), Some("After"));
        assert_eq!(reconfigured.config, new_config);
    }

    #[test]
    fn test_missing_source() {
        let db = Database::open_in_memory().unwrap();
        let repo = SourceRepository::new();

        assert!(db.with_conn(|conn| repo.get(conn, 7)).unwrap().is_none());
        assert!(db
            .with_conn(|conn| repo.update(conn, 7, Some("x"), None))
            .unwrap()
            .is_none());
        assert!(db.with_conn(|conn| repo.delete(conn, 7)).unwrap().is_none());
    }

    #[test]
    fn test_delete_detaches_site() {
        let db = Database::open_in_memory().unwrap();
        let repo = SourceRepository::new();
        let source = db
            .with_conn(|conn| repo.create(conn, "web", None, &json!({})))
            .unwrap();

        db.execute(
            "INSERT INTO sites (source_id, url, start_url, created_at)
             VALUES (?1, 'https://a.com/', 'https://a.com/', 'now')",
            params![source.id],
        )
        .unwrap();

        db.with_conn(|conn| repo.delete(conn, source.id)).unwrap();

        let linked: Option<i64> = db
            .fetch_one("SELECT source_id FROM sites WHERE url = 'https://a.com/'", [], |row| {
                row.get(0)
            })
            .unwrap()
            .unwrap();
        assert_eq!(linked, None);
    }
}
