//! Persisted crawl frontier
//!
//! One row per discovered URL per site in `crawl_state`. Entries are handed
//! out oldest-first by discovery time, and every state change is a single
//! statement so it commits atomically.

use crate::state::FrontierStatus;
use crate::storage::{
    format_timestamp, frontier_entry_from_row, Database, FrontierEntry, FRONTIER_COLUMNS,
};
use crate::{AuroraError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Work queue of discovered URLs, scoped per site
#[derive(Debug, Clone)]
pub struct Frontier {
    db: Database,
}

impl Frontier {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Adds a URL as pending at depth 0
    ///
    /// Returns false when the URL was already known for the site.
    pub fn add(&self, site_id: i64, url: &str) -> Result<bool> {
        self.add_at_depth(site_id, url, 0)
    }

    /// Adds a URL as pending, recording how many links away from the start
    /// URL it was found
    pub fn add_at_depth(&self, site_id: i64, url: &str, depth: u32) -> Result<bool> {
        let inserted = self.db.execute(
            "INSERT INTO crawl_state (site_id, url, status, depth, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(site_id, url) DO NOTHING",
            params![
                site_id,
                url,
                FrontierStatus::Pending.to_db_string(),
                depth,
                format_timestamp(Utc::now()),
            ],
        )?;

        if inserted > 0 {
            tracing::trace!("Enqueued {} for site {} at depth {}", url, site_id, depth);
        }
        Ok(inserted > 0)
    }

    /// Returns the oldest pending entry for the site without changing it
    pub fn next_pending(&self, site_id: i64) -> Result<Option<FrontierEntry>> {
        let sql = format!(
            "SELECT {} FROM crawl_state
             WHERE site_id = ?1 AND status = ?2
             ORDER BY discovered_at ASC, id ASC
             LIMIT 1",
            FRONTIER_COLUMNS
        );
        Ok(self.db.fetch_one(
            &sql,
            params![site_id, FrontierStatus::Pending.to_db_string()],
            frontier_entry_from_row,
        )?)
    }

    /// Atomically moves the oldest pending entry to in-progress and returns it
    ///
    /// An entry returned here is never returned again by `next_pending` or
    /// `claim_next` until it is released.
    pub fn claim_next(&self, site_id: i64) -> Result<Option<FrontierEntry>> {
        let sql = format!(
            "UPDATE crawl_state SET status = ?3
             WHERE id = (
                 SELECT id FROM crawl_state
                 WHERE site_id = ?1 AND status = ?2
                 ORDER BY discovered_at ASC, id ASC
                 LIMIT 1
             )
             AND status = ?2
             RETURNING {}",
            FRONTIER_COLUMNS
        );
        Ok(self.db.fetch_one(
            &sql,
            params![
                site_id,
                FrontierStatus::Pending.to_db_string(),
                FrontierStatus::InProgress.to_db_string(),
            ],
            frontier_entry_from_row,
        )?)
    }

    /// Returns in-progress entries of the site to pending
    pub fn release_claims(&self, site_id: i64) -> Result<usize> {
        let released = self.db.execute(
            "UPDATE crawl_state SET status = ?2 WHERE site_id = ?1 AND status = ?3",
            params![
                site_id,
                FrontierStatus::Pending.to_db_string(),
                FrontierStatus::InProgress.to_db_string(),
            ],
        )?;

        if released > 0 {
            tracing::info!("Released {} stale claims for site {}", released, site_id);
        }
        Ok(released)
    }

    /// Marks an entry as fetched successfully
    pub fn mark_success(&self, entry_id: i64, fetched_at: DateTime<Utc>) -> Result<()> {
        self.db.with_conn(|conn| {
            ensure_unresolved(conn, entry_id, FrontierStatus::Success)?;
            conn.execute(
                "UPDATE crawl_state SET status = ?2, fetched_at = ?3, last_error = NULL WHERE id = ?1",
                params![
                    entry_id,
                    FrontierStatus::Success.to_db_string(),
                    format_timestamp(fetched_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Marks an entry as failed, keeping the reason
    pub fn mark_error(&self, entry_id: i64, message: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            ensure_unresolved(conn, entry_id, FrontierStatus::Error)?;
            conn.execute(
                "UPDATE crawl_state SET status = ?2, last_error = ?3 WHERE id = ?1",
                params![entry_id, FrontierStatus::Error.to_db_string(), message],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, entry_id: i64) -> Result<Option<FrontierEntry>> {
        self.db.with_conn(|conn| get_entry(conn, entry_id))
    }

    pub fn get_by_url(&self, site_id: i64, url: &str) -> Result<Option<FrontierEntry>> {
        let sql = format!(
            "SELECT {} FROM crawl_state WHERE site_id = ?1 AND url = ?2",
            FRONTIER_COLUMNS
        );
        Ok(self
            .db
            .fetch_one(&sql, params![site_id, url], frontier_entry_from_row)?)
    }

    /// Lists every entry of a site in discovery order
    pub fn list(&self, site_id: i64) -> Result<Vec<FrontierEntry>> {
        let sql = format!(
            "SELECT {} FROM crawl_state WHERE site_id = ?1 ORDER BY discovered_at ASC, id ASC",
            FRONTIER_COLUMNS
        );
        Ok(self
            .db
            .fetch_all(&sql, params![site_id], frontier_entry_from_row)?)
    }

    pub fn count_by_status(&self, site_id: i64, status: FrontierStatus) -> Result<u64> {
        let count: Option<i64> = self.db.fetch_one(
            "SELECT COUNT(*) FROM crawl_state WHERE site_id = ?1 AND status = ?2",
            params![site_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }
}

fn get_entry(conn: &Connection, entry_id: i64) -> Result<Option<FrontierEntry>> {
    let sql = format!("SELECT {} FROM crawl_state WHERE id = ?1", FRONTIER_COLUMNS);
    Ok(conn
        .query_row(&sql, params![entry_id], frontier_entry_from_row)
        .optional()?)
}

/// Fails with NotFound for a missing entry and InvalidTransition for a
/// resolved one
fn ensure_unresolved(conn: &Connection, entry_id: i64, to: FrontierStatus) -> Result<()> {
    let entry = get_entry(conn, entry_id)?
        .ok_or_else(|| AuroraError::not_found("frontier entry", entry_id))?;

    if entry.status.is_terminal() {
        return Err(AuroraError::InvalidTransition {
            id: entry_id,
            from: entry.status,
            to,
        });
    }
    Ok(())
}
