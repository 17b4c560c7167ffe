//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Aurora-Crawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Ingestion sources (web, uploads, ...)
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL,
    name TEXT,
    config TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sources_type ON sources(type);

-- Sites registered for crawling
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER REFERENCES sources(id) ON DELETE SET NULL,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    start_url TEXT NOT NULL,
    allowed_domains TEXT NOT NULL DEFAULT '[]',
    max_depth INTEGER NOT NULL DEFAULT 2,
    created_at TEXT NOT NULL,
    last_crawled_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_sites_source ON sites(source_id);

-- Files attached to a source
CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_artifacts_source ON artifacts(source_id);

-- Crawl frontier: one row per discovered URL per site
CREATE TABLE IF NOT EXISTS crawl_state (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    discovered_at TEXT NOT NULL,
    fetched_at TEXT,
    last_error TEXT,
    UNIQUE(site_id, url)
);

CREATE INDEX IF NOT EXISTS idx_crawl_state_queue ON crawl_state(site_id, status, discovered_at);

-- Fetched page content
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    raw_html TEXT NOT NULL,
    checksum TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    UNIQUE(site_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_checksum ON pages(checksum);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
