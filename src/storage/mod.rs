//! Storage module for persisting crawl and ingestion data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The transactional `Database` handle shared by every component
//! - Site, source and artifact repositories
//! - Record types for frontier entries and stored pages

mod artifacts;
mod database;
mod error;
mod schema;
mod sites;
mod sources;

pub use artifacts::ArtifactRepository;
pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use sites::SiteRepository;
pub use sources::SourceRepository;

use crate::state::FrontierStatus;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;

/// A site registered for crawling
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: i64,
    pub source_id: Option<i64>,
    pub url: String,
    pub name: String,
    pub start_url: String,
    pub allowed_domains: Vec<String>,
    pub max_depth: u32,
    pub created_at: DateTime<Utc>,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

/// Fields for creating a site
#[derive(Debug, Clone)]
pub struct NewSite {
    pub source_id: Option<i64>,
    pub url: String,
    pub name: String,
    pub start_url: String,
    pub allowed_domains: Vec<String>,
    pub max_depth: u32,
}

/// Fields a source update projects onto its linked site
#[derive(Debug, Clone)]
pub struct SiteUpdate {
    pub name: String,
    pub start_url: String,
    pub allowed_domains: Vec<String>,
    pub max_depth: u32,
}

/// An ingestion source
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: i64,
    /// Type tag used to select a source handler (e.g. "web")
    pub source_type: String,
    pub name: Option<String>,
    /// Type-specific configuration payload
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// How an artifact came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Upload,
    Crawl,
    Sync,
}

impl ArtifactKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Crawl => "crawl",
            Self::Sync => "sync",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(Self::Upload),
            "crawl" => Some(Self::Crawl),
            "sync" => Some(Self::Sync),
            _ => None,
        }
    }
}

/// A stored file belonging to a source
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: i64,
    pub source_id: i64,
    pub kind: ArtifactKind,
    pub mime_type: String,
    pub path: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating an artifact
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub source_id: i64,
    pub kind: ArtifactKind,
    pub mime_type: String,
    pub path: String,
    pub size_bytes: u64,
}

/// A discovered URL in a site's crawl frontier
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    pub id: i64,
    pub site_id: i64,
    pub url: String,
    pub status: FrontierStatus,
    /// Link distance from the site's start URL
    pub depth: u32,
    pub discovered_at: DateTime<Utc>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Stored content of a fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    pub url: String,
    pub raw_html: String,
    pub checksum: String,
    pub fetched_at: DateTime<Utc>,
}

/// Formats a timestamp for storage
///
/// Fixed microsecond precision keeps lexical order equal to time order.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(idx, &raw)
}

pub(crate) fn optional_timestamp_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_timestamp(idx, &s)).transpose()
}

pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn invalid_enum(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(StorageError::Corrupt(format!("unknown value '{}'", raw))),
    )
}

/// Column list matching `frontier_entry_from_row`
pub(crate) const FRONTIER_COLUMNS: &str =
    "id, site_id, url, status, depth, discovered_at, fetched_at, last_error";

pub(crate) fn frontier_entry_from_row(row: &Row<'_>) -> rusqlite::Result<FrontierEntry> {
    let status: String = row.get(3)?;
    Ok(FrontierEntry {
        id: row.get(0)?,
        site_id: row.get(1)?,
        url: row.get(2)?,
        status: FrontierStatus::from_db_string(&status).ok_or_else(|| invalid_enum(3, &status))?,
        depth: row.get(4)?,
        discovered_at: timestamp_column(row, 5)?,
        fetched_at: optional_timestamp_column(row, 6)?,
        last_error: row.get(7)?,
    })
}

/// Column list matching `page_from_row`
pub(crate) const PAGE_COLUMNS: &str = "id, site_id, url, raw_html, checksum, fetched_at";

pub(crate) fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        url: row.get(2)?,
        raw_html: row.get(3)?,
        checksum: row.get(4)?,
        fetched_at: timestamp_column(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_artifact_kind_roundtrip() {
        for kind in [ArtifactKind::Upload, ArtifactKind::Crawl, ArtifactKind::Sync] {
            assert_eq!(ArtifactKind::from_db_string(kind.to_db_string()), Some(kind));
        }
        assert_eq!(ArtifactKind::from_db_string("invalid"), None);
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);

        let a = format_timestamp(earlier);
        let b = format_timestamp(later);

        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(0, &a).unwrap(), earlier);
    }
}
