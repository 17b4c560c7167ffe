use serde::Deserialize;

/// Main configuration structure for Aurora-Crawl
///
/// Every section is optional; missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub fetcher: FetcherConfig,
    pub crawler: CrawlerConfig,
    pub ingestion: IngestionConfig,
}

/// Storage location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "aurora.db".to_string(),
        }
    }
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum number of redirects followed for a single fetch
    pub max_redirects: usize,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_redirects: 10,
            user_agent: format!("AuroraCrawler/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Crawl loop behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of frontier entries processed concurrently for one site
    pub workers: usize,

    /// Check robots.txt before fetching each URL
    pub respect_robots_txt: bool,

    /// Stop enqueueing links deeper than the site's max depth
    pub enforce_max_depth: bool,

    /// Max depth given to sites created by `submit_site`
    pub default_max_depth: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            respect_robots_txt: false,
            enforce_max_depth: false,
            default_max_depth: 2,
        }
    }
}

/// Artifact ingestion behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IngestionConfig {
    /// Number of artifacts buffered before `enqueue` starts rejecting
    pub queue_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
        }
    }
}
