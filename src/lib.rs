//! Aurora-Crawl: per-site web crawling and source ingestion dispatch
//!
//! This crate discovers, fetches and persists the pages of registered sites,
//! and routes source/artifact lifecycle events to handlers registered by
//! source type or MIME type.

pub mod config;
pub mod crawler;
pub mod ingestion;
pub mod robots;
pub mod services;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Aurora-Crawl operations
#[derive(Debug, Error)]
pub enum AuroraError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("No handler registered for {kind} '{key}'")]
    NoHandlerRegistered { kind: &'static str, key: String },

    #[error("Invalid source configuration: {0}")]
    InvalidSourceConfig(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid state transition for frontier entry {id}: {from} -> {to}")]
    InvalidTransition {
        id: i64,
        from: state::FrontierStatus,
        to: state::FrontierStatus,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Artifact queue error: {0}")]
    Queue(#[from] ingestion::QueueError),

    #[error("Crawl worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl AuroraError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for AuroraError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(storage::StorageError::from(err))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Aurora-Crawl operations
pub type Result<T> = std::result::Result<T, AuroraError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlOrchestrator, CrawlSummary, Frontier, HttpFetcher, PageStore};
pub use ingestion::IngestionCoordinator;
pub use services::Services;
pub use state::FrontierStatus;
pub use storage::Database;
