//! Site repository
//!
//! Plain CRUD over the `sites` table. Every method takes the connection to
//! run on, so callers decide whether it participates in a transaction.

use crate::storage::{
    format_timestamp, json_column, optional_timestamp_column, timestamp_column, NewSite, Site,
    SiteUpdate, StorageResult,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SITE_COLUMNS: &str =
    "id, source_id, url, name, start_url, allowed_domains, max_depth, created_at, last_crawled_at";

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        source_id: row.get(1)?,
        url: row.get(2)?,
        name: row.get(3)?,
        start_url: row.get(4)?,
        allowed_domains: json_column(row, 5)?,
        max_depth: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
        last_crawled_at: optional_timestamp_column(row, 8)?,
    })
}

/// Repository for site records
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteRepository;

impl SiteRepository {
    pub fn new() -> Self {
        Self
    }

    /// Inserts a new site and returns the stored record
    pub fn create(&self, conn: &Connection, site: &NewSite) -> StorageResult<Site> {
        let allowed_domains = serde_json::to_string(&site.allowed_domains)?;
        let sql = format!(
            "INSERT INTO sites (source_id, url, name, start_url, allowed_domains, max_depth, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {}",
            SITE_COLUMNS
        );

        let created = conn.query_row(
            &sql,
            params![
                site.source_id,
                site.url,
                site.name,
                site.start_url,
                allowed_domains,
                site.max_depth,
                format_timestamp(Utc::now()),
            ],
            site_from_row,
        )?;

        tracing::info!("Created site {} ({})", created.id, created.url);
        Ok(created)
    }

    pub fn get(&self, conn: &Connection, site_id: i64) -> StorageResult<Option<Site>> {
        let sql = format!("SELECT {} FROM sites WHERE id = ?1", SITE_COLUMNS);
        Ok(conn
            .query_row(&sql, params![site_id], site_from_row)
            .optional()?)
    }

    pub fn get_by_url(&self, conn: &Connection, url: &str) -> StorageResult<Option<Site>> {
        let sql = format!("SELECT {} FROM sites WHERE url = ?1", SITE_COLUMNS);
        Ok(conn.query_row(&sql, params![url], site_from_row).optional()?)
    }

    /// Gets the site linked to an ingestion source
    pub fn get_by_source_id(
        &self,
        conn: &Connection,
        source_id: i64,
    ) -> StorageResult<Option<Site>> {
        let sql = format!(
            "SELECT {} FROM sites WHERE source_id = ?1 ORDER BY id LIMIT 1",
            SITE_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![source_id], site_from_row)
            .optional()?)
    }

    pub fn list(&self, conn: &Connection) -> StorageResult<Vec<Site>> {
        let sql = format!("SELECT {} FROM sites ORDER BY id", SITE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let sites = stmt
            .query_map([], site_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    /// Overwrites the crawl settings of a site
    ///
    /// Returns `None` when no site has the given id.
    pub fn update(
        &self,
        conn: &Connection,
        site_id: i64,
        update: &SiteUpdate,
    ) -> StorageResult<Option<Site>> {
        let allowed_domains = serde_json::to_string(&update.allowed_domains)?;
        let sql = format!(
            "UPDATE sites SET name = ?2, start_url = ?3, allowed_domains = ?4, max_depth = ?5
             WHERE id = ?1
             RETURNING {}",
            SITE_COLUMNS
        );

        Ok(conn
            .query_row(
                &sql,
                params![
                    site_id,
                    update.name,
                    update.start_url,
                    allowed_domains,
                    update.max_depth
                ],
                site_from_row,
            )
            .optional()?)
    }

    /// Records when a crawl of the site last finished
    pub fn mark_crawled(
        &self,
        conn: &Connection,
        site_id: i64,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        conn.execute(
            "UPDATE sites SET last_crawled_at = ?2 WHERE id = ?1",
            params![site_id, format_timestamp(at)],
        )?;
        Ok(())
    }

    /// Deletes a site, returning the removed record
    pub fn delete(&self, conn: &Connection, site_id: i64) -> StorageResult<Option<Site>> {
        let sql = format!("DELETE FROM sites WHERE id = ?1 RETURNING {}", SITE_COLUMNS);
        let deleted = conn
            .query_row(&sql, params![site_id], site_from_row)
            .optional()?;

        if let Some(site) = &deleted {
            tracing::info!("Deleted site {} ({})", site.id, site.url);
        }
        Ok(deleted)
    }
}
