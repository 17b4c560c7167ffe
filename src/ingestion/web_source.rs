//! The "web" source type
//!
//! A web source owns at most one Site. Its configuration payload carries the
//! crawl settings, which are projected onto the linked Site on every change.

use crate::ingestion::SourceHandler;
use crate::storage::{NewSite, SiteRepository, SiteUpdate, Source};
use crate::{AuroraError, Result};
use rusqlite::Connection;
use serde::Deserialize;
use url::Url;

/// Source type tag handled by `WebSourceHandler`
pub const SOURCE_TYPE: &str = "web";

fn default_max_depth() -> u32 {
    2
}

/// Crawl settings carried in a web source's config payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebSourceConfig {
    pub start_url: String,

    #[serde(default)]
    pub allowed_domains: Vec<String>,

    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl WebSourceConfig {
    /// Parses and validates the config of a web source
    ///
    /// An empty `allowed_domains` list defaults to the start URL's host.
    pub fn from_source(source: &Source) -> Result<Self> {
        let mut config: Self = serde_json::from_value(source.config.clone())
            .map_err(|e| AuroraError::InvalidSourceConfig(e.to_string()))?;

        let start = Url::parse(&config.start_url).map_err(|e| {
            AuroraError::InvalidSourceConfig(format!(
                "start_url '{}' is not a valid URL: {}",
                config.start_url, e
            ))
        })?;

        if !matches!(start.scheme(), "http" | "https") {
            return Err(AuroraError::InvalidSourceConfig(format!(
                "start_url '{}' must use http or https",
                config.start_url
            )));
        }

        config.allowed_domains.retain(|d| !d.trim().is_empty());
        if config.allowed_domains.is_empty() {
            let host = start.host_str().ok_or_else(|| {
                AuroraError::InvalidSourceConfig(format!(
                    "start_url '{}' has no host",
                    config.start_url
                ))
            })?;
            config.allowed_domains.push(host.to_string());
        }

        Ok(config)
    }
}

/// Keeps a Site in sync with its web source
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSourceHandler {
    sites: SiteRepository,
}

impl WebSourceHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn display_name(source: &Source, config: &WebSourceConfig) -> String {
        source
            .name
            .clone()
            .unwrap_or_else(|| config.start_url.clone())
    }

    fn create_site(&self, source: &Source, config: WebSourceConfig, conn: &Connection) -> Result<()> {
        let site = NewSite {
            source_id: Some(source.id),
            url: config.start_url.clone(),
            name: Self::display_name(source, &config),
            start_url: config.start_url,
            allowed_domains: config.allowed_domains,
            max_depth: config.max_depth,
        };
        let created = self.sites.create(conn, &site)?;

        tracing::info!("Source {} linked to site {}", source.id, created.id);
        Ok(())
    }
}

impl SourceHandler for WebSourceHandler {
    fn on_created(&self, source: &Source, conn: &Connection) -> Result<()> {
        let config = WebSourceConfig::from_source(source)?;
        self.create_site(source, config, conn)
    }

    fn on_updated(&self, source: &Source, conn: &Connection) -> Result<()> {
        let config = WebSourceConfig::from_source(source)?;

        match self.sites.get_by_source_id(conn, source.id)? {
            Some(site) => {
                let update = SiteUpdate {
                    name: Self::display_name(source, &config),
                    start_url: config.start_url,
                    allowed_domains: config.allowed_domains,
                    max_depth: config.max_depth,
                };
                self.sites.update(conn, site.id, &update)?;
                tracing::info!("Updated site {} from source {}", site.id, source.id);
                Ok(())
            }
            None => self.create_site(source, config, conn),
        }
    }

    fn on_deleted(&self, source: &Source, conn: &Connection) -> Result<()> {
        if let Some(site) = self.sites.get_by_source_id(conn, source.id)? {
            self.sites.delete(conn, site.id)?;
        } else {
            tracing::debug!("Source {} had no linked site", source.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn source(config: serde_json::Value) -> Source {
        Source {
            id: 5,
            source_type: SOURCE_TYPE.to_string(),
            name: Some("Docs".to_string()),
            config,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config =
            WebSourceConfig::from_source(&source(json!({"start_url": "https://docs.example.com/"})))
                .unwrap();

        assert_eq!(config.max_depth, 2);
        assert_eq!(config.allowed_domains, vec!["docs.example.com".to_string()]);
    }

    #[test]
    fn test_config_explicit_values() {
        let config = WebSourceConfig::from_source(&source(json!({
            "start_url": "https://example.com/",
            "allowed_domains": ["example.com", "cdn.example.com"],
            "max_depth": 4
        })))
        .unwrap();

        assert_eq!(config.max_depth, 4);
        assert_eq!(config.allowed_domains.len(), 2);
    }

    #[test]
    fn test_config_rejects_bad_payloads() {
        let cases = [
            json!({}),
            json!({"start_url": 12}),
            json!({"start_url": "not a url"}),
            json!({"start_url": "ftp://example.com/"}),
            json!({"start_url": "https://example.com/", "max_depth": -1}),
        ];

        for payload in cases {
            let result = WebSourceConfig::from_source(&source(payload.clone()));
            assert!(
                matches!(result, Err(AuroraError::InvalidSourceConfig(_))),
                "{} should be rejected",
                payload
            );
        }
    }
}
