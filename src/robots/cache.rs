//! Robots.txt caching implementation
//!
//! Rules are fetched lazily per origin through the crawler's fetcher and
//! kept for 24 hours.

use crate::crawler::HttpFetcher;
use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use url::Url;

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Per-origin robots.txt rules for one user agent
#[derive(Debug)]
pub struct RobotsCache {
    fetcher: HttpFetcher,
    user_agent: String,
    entries: RwLock<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new(fetcher: HttpFetcher, user_agent: impl Into<String>) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Checks whether `url` may be fetched, loading its origin's rules first
    /// if needed
    ///
    /// Unparseable URLs and origins whose robots.txt is not served with
    /// HTTP 200 are allowed.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return true,
        };
        let origin = parsed.origin().ascii_serialization();

        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(&origin).filter(|c| !c.is_stale()) {
                return cached.content.is_allowed(url, &self.user_agent);
            }
        }

        let robots = self.load(&origin).await;
        let allowed = robots.is_allowed(url, &self.user_agent);
        self.entries
            .write()
            .await
            .insert(origin, CachedRobots::new(robots));
        allowed
    }

    async fn load(&self, origin: &str) -> ParsedRobots {
        let robots_url = format!("{}/robots.txt", origin);
        let outcome = self.fetcher.fetch(&robots_url).await;

        if !outcome.is_success() {
            tracing::debug!(
                "No usable robots.txt at {} (status {}), allowing all",
                robots_url,
                outcome.status
            );
            return ParsedRobots::allow_all();
        }

        tracing::debug!("Loaded {}", robots_url);
        ParsedRobots::from_content(outcome.body.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cache_not_stale() {
        let cache = CachedRobots::new(ParsedRobots::allow_all());
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_cache_is_stale_after_a_day() {
        let mut cache = CachedRobots::new(ParsedRobots::allow_all());

        cache.fetched_at = Utc::now() - Duration::hours(25);
        assert!(cache.is_stale());

        cache.fetched_at = Utc::now() - Duration::hours(23);
        assert!(!cache.is_stale());
    }

    #[tokio::test]
    async fn test_unparseable_url_allowed_without_fetch() {
        let fetcher = HttpFetcher::new(&crate::config::FetcherConfig::default()).unwrap();
        let cache = RobotsCache::new(fetcher, "TestBot/1.0");

        assert!(cache.is_allowed("not a url").await);
        assert!(cache.entries.read().await.is_empty());
    }
}
