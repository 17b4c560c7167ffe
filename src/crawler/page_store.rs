//! Content-addressed page storage

use crate::storage::{format_timestamp, page_from_row, Database, PageRecord, PAGE_COLUMNS};
use crate::Result;
use chrono::Utc;
use rusqlite::params;
use sha2::{Digest, Sha256};

/// Computes the lowercase hex SHA-256 of a page body
pub fn compute_checksum(raw_html: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_html.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stores the latest fetched content of each (site, URL)
#[derive(Debug, Clone)]
pub struct PageStore {
    db: Database,
}

impl PageStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts or overwrites a page, returning its checksum
    ///
    /// The checksum and fetch time are recomputed on every write.
    pub fn upsert(&self, site_id: i64, url: &str, raw_html: &str) -> Result<String> {
        let checksum = compute_checksum(raw_html);

        self.db.execute(
            "INSERT INTO pages (site_id, url, raw_html, checksum, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(site_id, url) DO UPDATE SET
                 raw_html = excluded.raw_html,
                 checksum = excluded.checksum,
                 fetched_at = excluded.fetched_at",
            params![
                site_id,
                url,
                raw_html,
                checksum,
                format_timestamp(Utc::now())
            ],
        )?;

        tracing::trace!("Stored {} ({} bytes, sha256 {})", url, raw_html.len(), checksum);
        Ok(checksum)
    }

    pub fn get(&self, site_id: i64, url: &str) -> Result<Option<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE site_id = ?1 AND url = ?2",
            PAGE_COLUMNS
        );
        Ok(self.db.fetch_one(&sql, params![site_id, url], page_from_row)?)
    }

    pub fn count_for_site(&self, site_id: i64) -> Result<u64> {
        let count: Option<i64> = self.db.fetch_one(
            "SELECT COUNT(*) FROM pages WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }
}
