//! Crawl orchestration
//!
//! Drives the fetch -> store -> extract -> enqueue loop for one site until
//! its frontier has no pending entries left. Fetch failures are recorded on
//! the frontier entry and never abort the crawl; storage failures do.

use crate::config::CrawlerConfig;
use crate::crawler::{extract_links, Frontier, HttpFetcher, PageStore};
use crate::robots::RobotsCache;
use crate::storage::{Database, FrontierEntry, NewSite, Site, SiteRepository};
use crate::{AuroraError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use url::Url;

/// Error message recorded for URLs excluded by robots.txt
pub const ROBOTS_DISALLOWED: &str = "disallowed by robots.txt";

/// Totals for one `crawl_site` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub site_id: i64,
    /// Entries fetched with HTTP 200 and stored
    pub fetched: u64,
    /// Entries marked as error
    pub failed: u64,
    /// New frontier entries discovered
    pub enqueued: u64,
}

impl CrawlSummary {
    fn new(site_id: i64) -> Self {
        Self {
            site_id,
            ..Self::default()
        }
    }

    pub fn processed(&self) -> u64 {
        self.fetched + self.failed
    }

    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Fetched { enqueued } => {
                self.fetched += 1;
                self.enqueued += enqueued;
            }
            EntryOutcome::Failed => self.failed += 1,
        }

        if self.processed() % 10 == 0 {
            tracing::info!(
                "Site {}: {} processed ({} ok, {} failed)",
                self.site_id,
                self.processed(),
                self.fetched,
                self.failed
            );
        }
    }
}

/// What happened to a single frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Fetched { enqueued: u64 },
    Failed,
}

/// One lock per site; a crawl holds its site's lock from start to finish
type SiteLocks = Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>;

/// Crawls registered sites
///
/// Clones share the same per-site locks, so two `crawl_site` calls for one
/// site run one after the other instead of releasing each other's claims.
#[derive(Debug, Clone)]
pub struct CrawlOrchestrator {
    db: Database,
    sites: SiteRepository,
    frontier: Frontier,
    pages: PageStore,
    fetcher: HttpFetcher,
    settings: CrawlerConfig,
    robots: Option<Arc<RobotsCache>>,
    active: SiteLocks,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator over the given database
    ///
    /// # Arguments
    ///
    /// * `db` - Shared database handle
    /// * `fetcher` - HTTP fetcher used for pages and robots.txt
    /// * `settings` - Crawl loop settings
    /// * `user_agent` - User agent matched against robots.txt rules
    pub fn new(
        db: Database,
        fetcher: HttpFetcher,
        settings: CrawlerConfig,
        user_agent: &str,
    ) -> Self {
        let robots = settings
            .respect_robots_txt
            .then(|| Arc::new(RobotsCache::new(fetcher.clone(), user_agent)));

        Self {
            frontier: Frontier::new(db.clone()),
            pages: PageStore::new(db.clone()),
            sites: SiteRepository::new(),
            db,
            fetcher,
            settings,
            robots,
            active: SiteLocks::default(),
        }
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    /// Crawls a site until no pending URLs remain
    ///
    /// A second call for a site that is already being crawled waits for the
    /// first to finish, then resumes whatever is still pending.
    ///
    /// # Arguments
    ///
    /// * `site_id` - The site to crawl
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Frontier drained
    /// * `Err(AuroraError::NotFound)` - No such site
    /// * `Err(AuroraError::Storage)` - A persistence step failed
    pub async fn crawl_site(&self, site_id: i64) -> Result<CrawlSummary> {
        let site = self
            .db
            .with_conn(|conn| self.sites.get(conn, site_id))?
            .ok_or_else(|| AuroraError::not_found("site", site_id))?;

        let lock = self.site_lock(site.id).await;
        let _running = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!("Site {} is already being crawled, waiting", site.id);
                lock.lock_owned().await
            }
        };

        // Claims left over from an interrupted run; no live crawl of this site holds any
        self.frontier.release_claims(site.id)?;
        self.frontier.add(site.id, &site.start_url)?;

        tracing::info!(
            "Starting crawl of site {} ({}) with {} worker(s)",
            site.id,
            site.start_url,
            self.settings.workers.max(1)
        );

        let summary = if self.settings.workers > 1 {
            self.run_concurrent(Arc::new(site)).await?
        } else {
            self.run_sequential(&site).await?
        };

        self.db
            .with_conn(|conn| self.sites.mark_crawled(conn, site_id, Utc::now()))?;

        tracing::info!(
            "Finished crawl of site {}: {} fetched, {} failed, {} enqueued",
            summary.site_id,
            summary.fetched,
            summary.failed,
            summary.enqueued
        );
        Ok(summary)
    }

    async fn site_lock(&self, site_id: i64) -> Arc<Mutex<()>> {
        let mut active = self.active.lock().await;
        Arc::clone(active.entry(site_id).or_default())
    }

    async fn run_sequential(&self, site: &Site) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::new(site.id);

        while let Some(entry) = self.frontier.next_pending(site.id)? {
            let outcome = self.process_entry(site, entry).await?;
            summary.record(outcome);
        }

        Ok(summary)
    }

    async fn run_concurrent(&self, site: Arc<Site>) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::new(site.id);
        let mut in_flight = JoinSet::new();

        loop {
            while in_flight.len() < self.settings.workers {
                let Some(entry) = self.frontier.claim_next(site.id)? else {
                    break;
                };

                let worker = self.clone();
                let site = Arc::clone(&site);
                in_flight.spawn(async move { worker.process_entry(&site, entry).await });
            }

            // Nothing claimable and nothing running: the frontier is drained
            match in_flight.join_next().await {
                Some(joined) => summary.record(joined??),
                None => break,
            }
        }

        Ok(summary)
    }

    async fn process_entry(&self, site: &Site, entry: FrontierEntry) -> Result<EntryOutcome> {
        if let Some(robots) = &self.robots {
            if !robots.is_allowed(&entry.url).await {
                tracing::debug!("Skipping {}: {}", entry.url, ROBOTS_DISALLOWED);
                self.frontier.mark_error(entry.id, ROBOTS_DISALLOWED)?;
                return Ok(EntryOutcome::Failed);
            }
        }

        let outcome = self.fetcher.fetch(&entry.url).await;
        if !outcome.is_success() {
            tracing::debug!("Failed {}: HTTP status {}", entry.url, outcome.status);
            self.frontier
                .mark_error(entry.id, &format!("HTTP status: {}", outcome.status))?;
            return Ok(EntryOutcome::Failed);
        }
        let body = outcome.body.unwrap_or_default();

        self.pages.upsert(site.id, &entry.url, &body)?;
        self.frontier.mark_success(entry.id, Utc::now())?;

        let next_depth = entry.depth.saturating_add(1);
        if self.settings.enforce_max_depth && next_depth > site.max_depth {
            tracing::trace!("Not following links of {}: depth limit reached", entry.url);
            return Ok(EntryOutcome::Fetched { enqueued: 0 });
        }

        let mut enqueued = 0;
        for link in extract_links(&body, &entry.url, &site.allowed_domains) {
            if self.frontier.add_at_depth(site.id, &link, next_depth)? {
                enqueued += 1;
            }
        }

        tracing::debug!("Fetched {} ({} new links)", entry.url, enqueued);
        Ok(EntryOutcome::Fetched { enqueued })
    }

    /// Returns the site registered under `url`, creating it if needed
    ///
    /// A new site is restricted to the URL's host and gets the configured
    /// default max depth.
    pub fn submit_site(&self, url: &str) -> Result<Site> {
        let parsed = Url::parse(url).map_err(|e| AuroraError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AuroraError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| AuroraError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();

        self.db.transaction(|conn| {
            if let Some(existing) = self.sites.get_by_url(conn, url)? {
                return Ok(existing);
            }

            let site = NewSite {
                source_id: None,
                url: url.to_string(),
                name: host.clone(),
                start_url: url.to_string(),
                allowed_domains: vec![host.clone()],
                max_depth: self.settings.default_max_depth,
            };
            Ok(self.sites.create(conn, &site)?)
        })
    }

    pub fn list_sites(&self) -> Result<Vec<Site>> {
        Ok(self.db.with_conn(|conn| self.sites.list(conn))?)
    }
}
