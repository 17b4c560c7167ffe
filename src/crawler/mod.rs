//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a bounded timeout and redirect chain
//! - HTML parsing and allow-listed link extraction
//! - The persisted per-site frontier
//! - Content-addressed page storage
//! - The crawl loop itself

mod fetcher;
mod frontier;
mod orchestrator;
mod page_store;
mod parser;

pub use fetcher::{build_http_client, FetchOutcome, HttpFetcher};
pub use frontier::Frontier;
pub use orchestrator::{CrawlOrchestrator, CrawlSummary, ROBOTS_DISALLOWED};
pub use page_store::{compute_checksum, PageStore};
pub use parser::{extract_links, is_allowed_domain, resolve_link};
