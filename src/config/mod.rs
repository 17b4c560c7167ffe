//! Configuration module for Aurora-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use aurora_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("aurora.toml")).unwrap();
//! println!("Crawl workers per site: {}", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, DatabaseConfig, FetcherConfig, IngestionConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
