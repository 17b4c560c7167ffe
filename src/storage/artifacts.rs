//! Artifact repository

use crate::storage::{
    format_timestamp, timestamp_column, Artifact, ArtifactKind, NewArtifact, StorageError,
    StorageResult,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

const ARTIFACT_COLUMNS: &str = "id, source_id, type, mime_type, path, size_bytes, created_at";

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<Artifact> {
    let kind: String = row.get(2)?;
    let size: i64 = row.get(5)?;

    Ok(Artifact {
        id: row.get(0)?,
        source_id: row.get(1)?,
        kind: ArtifactKind::from_db_string(&kind).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                Box::new(StorageError::Corrupt(format!("unknown artifact type '{}'", kind))),
            )
        })?,
        mime_type: row.get(3)?,
        path: row.get(4)?,
        size_bytes: u64::try_from(size).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(5, size))?,
        created_at: timestamp_column(row, 6)?,
    })
}

/// Repository for artifacts
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactRepository;

impl ArtifactRepository {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, conn: &Connection, artifact: &NewArtifact) -> StorageResult<Artifact> {
        let size = i64::try_from(artifact.size_bytes).map_err(|_| {
            StorageError::Corrupt(format!("artifact size {} too large", artifact.size_bytes))
        })?;
        let sql = format!(
            "INSERT INTO artifacts (source_id, type, mime_type, path, size_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {}",
            ARTIFACT_COLUMNS
        );

        Ok(conn.query_row(
            &sql,
            params![
                artifact.source_id,
                artifact.kind.to_db_string(),
                artifact.mime_type,
                artifact.path,
                size,
                format_timestamp(Utc::now()),
            ],
            artifact_from_row,
        )?)
    }

    pub fn get(&self, conn: &Connection, artifact_id: i64) -> StorageResult<Option<Artifact>> {
        let sql = format!("SELECT {} FROM artifacts WHERE id = ?1", ARTIFACT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![artifact_id], artifact_from_row)
            .optional()?)
    }

    pub fn list_for_source(&self, conn: &Connection, source_id: i64) -> StorageResult<Vec<Artifact>> {
        let sql = format!(
            "SELECT {} FROM artifacts WHERE source_id = ?1 ORDER BY id",
            ARTIFACT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let artifacts = stmt
            .query_map(params![source_id], artifact_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(artifacts)
    }

    pub fn delete(&self, conn: &Connection, artifact_id: i64) -> StorageResult<Option<Artifact>> {
        let sql = format!(
            "DELETE FROM artifacts WHERE id = ?1 RETURNING {}",
            ARTIFACT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![artifact_id], artifact_from_row)
            .optional()?)
    }
}
