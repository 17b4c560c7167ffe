//! Composition root
//!
//! Wires storage, the crawler and the ingestion coordinator together and
//! implements the "write metadata, then dispatch" flows. Source events are
//! dispatched inside the transaction that writes the source; artifact events
//! are dispatched after the artifact row has committed.

use crate::config::Config;
use crate::crawler::{CrawlOrchestrator, CrawlSummary, HttpFetcher};
use crate::ingestion::{
    ArtifactQueue, IngestionCoordinator, LoggingProcessor, WebSourceHandler, WorkerReport,
    WEB_SOURCE_TYPE, WILDCARD_MIME,
};
use crate::storage::{
    Artifact, ArtifactRepository, Database, NewArtifact, Site, Source, SourceRepository,
};
use crate::{AuroraError, Result};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Every component of a running instance
#[derive(Debug)]
pub struct Services {
    db: Database,
    sources: SourceRepository,
    artifacts: ArtifactRepository,
    orchestrator: CrawlOrchestrator,
    coordinator: IngestionCoordinator,
    artifact_worker: Option<JoinHandle<WorkerReport>>,
}

impl Services {
    /// Opens the configured database and builds every component
    ///
    /// Must be called from within a tokio runtime, since it starts the
    /// artifact queue worker.
    pub fn new(config: &Config) -> Result<Self> {
        let db = Database::open(Path::new(&config.database.path))?;
        Self::with_database(db, config)
    }

    /// Builds every component on top of an already open database
    pub fn with_database(db: Database, config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.fetcher)?;
        let orchestrator = CrawlOrchestrator::new(
            db.clone(),
            fetcher,
            config.crawler.clone(),
            &config.fetcher.user_agent,
        );

        let (queue, worker) =
            ArtifactQueue::spawn(config.ingestion.queue_capacity, Arc::new(LoggingProcessor));
        let coordinator = IngestionCoordinator::builder()
            .source_handler(WEB_SOURCE_TYPE, Arc::new(WebSourceHandler::new()))
            .artifact_handler(WILDCARD_MIME, Arc::new(queue))
            .build();

        Ok(Self::from_parts(db, orchestrator, coordinator, Some(worker)))
    }

    /// Assembles services from prebuilt components
    pub fn from_parts(
        db: Database,
        orchestrator: CrawlOrchestrator,
        coordinator: IngestionCoordinator,
        artifact_worker: Option<JoinHandle<WorkerReport>>,
    ) -> Self {
        Self {
            db,
            sources: SourceRepository::new(),
            artifacts: ArtifactRepository::new(),
            orchestrator,
            coordinator,
            artifact_worker,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn orchestrator(&self) -> &CrawlOrchestrator {
        &self.orchestrator
    }

    pub fn coordinator(&self) -> &IngestionCoordinator {
        &self.coordinator
    }

    /// Creates a source and lets its handler react in the same transaction
    ///
    /// # Returns
    ///
    /// * `Ok(Source)` - Source stored and handler succeeded
    /// * `Err(AuroraError::NoHandlerRegistered)` - Unknown source type; nothing stored
    /// * `Err(AuroraError::InvalidSourceConfig)` - Handler rejected the config; nothing stored
    pub fn create_source(
        &self,
        source_type: &str,
        name: Option<&str>,
        config: Value,
    ) -> Result<Source> {
        self.db.transaction(|conn| {
            let source = self.sources.create(conn, source_type, name, &config)?;
            self.coordinator.on_source_created(&source, conn)?;
            Ok(source)
        })
    }

    /// Updates a source's name and/or config; its type never changes
    pub fn update_source(
        &self,
        source_id: i64,
        name: Option<&str>,
        config: Option<Value>,
    ) -> Result<Source> {
        self.db.transaction(|conn| {
            let existing = self
                .sources
                .get(conn, source_id)?
                .ok_or_else(|| AuroraError::not_found("source", source_id))?;

            let requested_type = config
                .as_ref()
                .and_then(|c| c.get("type"))
                .and_then(Value::as_str);
            if let Some(requested) = requested_type {
                if requested != existing.source_type {
                    return Err(AuroraError::InvalidSourceConfig(format!(
                        "source type is immutable (is '{}', got '{}')",
                        existing.source_type, requested
                    )));
                }
            }

            let updated = self
                .sources
                .update(conn, source_id, name, config.as_ref())?
                .ok_or_else(|| AuroraError::not_found("source", source_id))?;
            self.coordinator.on_source_updated(&updated, conn)?;
            Ok(updated)
        })
    }

    /// Deletes a source after its handler has cleaned up
    pub fn delete_source(&self, source_id: i64) -> Result<Source> {
        self.db.transaction(|conn| {
            let source = self
                .sources
                .get(conn, source_id)?
                .ok_or_else(|| AuroraError::not_found("source", source_id))?;

            self.coordinator.on_source_deleted(&source, conn)?;
            self.sources.delete(conn, source_id)?;
            Ok(source)
        })
    }

    pub fn get_source(&self, source_id: i64) -> Result<Source> {
        self.db
            .with_conn(|conn| self.sources.get(conn, source_id))?
            .ok_or_else(|| AuroraError::not_found("source", source_id))
    }

    pub fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.db.with_conn(|conn| self.sources.list(conn))?)
    }

    /// Stores an artifact, then hands it to the handler for its MIME type
    ///
    /// The row is committed before dispatch, so a dispatch error (no handler,
    /// full queue) is returned with the artifact already stored.
    pub fn register_artifact(&self, artifact: NewArtifact) -> Result<Artifact> {
        let created = self.db.transaction(|conn| {
            if self.sources.get(conn, artifact.source_id)?.is_none() {
                return Err(AuroraError::not_found("source", artifact.source_id));
            }
            Ok(self.artifacts.create(conn, &artifact)?)
        })?;

        tracing::info!(
            "Registered artifact {} for source {}",
            created.id,
            created.source_id
        );
        self.coordinator.on_artifact_created(created.clone())?;
        Ok(created)
    }

    /// Dispatches a stored artifact again
    ///
    /// Used when the dispatch in `register_artifact` failed after the row
    /// had committed. Queue workers skip ids they have already processed.
    pub fn dispatch_artifact(&self, artifact_id: i64) -> Result<Artifact> {
        let artifact = self
            .db
            .with_conn(|conn| self.artifacts.get(conn, artifact_id))?
            .ok_or_else(|| AuroraError::not_found("artifact", artifact_id))?;

        tracing::info!(
            "Redispatching artifact {} ({})",
            artifact.id,
            artifact.mime_type
        );
        self.coordinator.on_artifact_created(artifact.clone())?;
        Ok(artifact)
    }

    pub fn list_artifacts(&self, source_id: i64) -> Result<Vec<Artifact>> {
        Ok(self
            .db
            .with_conn(|conn| self.artifacts.list_for_source(conn, source_id))?)
    }

    pub async fn crawl_site(&self, site_id: i64) -> Result<CrawlSummary> {
        self.orchestrator.crawl_site(site_id).await
    }

    pub fn submit_site(&self, url: &str) -> Result<Site> {
        self.orchestrator.submit_site(url)
    }

    pub fn list_sites(&self) -> Result<Vec<Site>> {
        self.orchestrator.list_sites()
    }

    /// Stops accepting artifacts and waits for queued ones to finish
    ///
    /// Returns the worker's report, or `None` when no worker was attached.
    pub async fn shutdown(self) -> Result<Option<WorkerReport>> {
        let Self {
            coordinator,
            artifact_worker,
            ..
        } = self;
        drop(coordinator);

        match artifact_worker {
            Some(worker) => Ok(Some(worker.await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn services() -> Services {
        let db = Database::open_in_memory().unwrap();
        Services::with_database(db, &Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_create_web_source_creates_site() {
        let services = services();

        let source = services
            .create_source(
                "web",
                Some("Docs"),
                json!({"start_url": "https://docs.example.com/"}),
            )
            .unwrap();

        let sites = services.list_sites().unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].source_id, Some(source.id));
        assert_eq!(sites[0].name, "Docs");
    }

    #[tokio::test]
    async fn test_update_rejects_type_change() {
        let services = services();
        let source = services
            .create_source("web", None, json!({"start_url": "https://example.com/"}))
            .unwrap();

        let result = services.update_source(
            source.id,
            None,
            Some(json!({"type": "upload", "start_url": "https://example.com/"})),
        );

        assert!(matches!(result, Err(AuroraError::InvalidSourceConfig(_))));
        assert_eq!(services.get_source(source.id).unwrap().config, source.config);
    }

    #[tokio::test]
    async fn test_missing_source_operations() {
        let services = services();

        assert!(matches!(
            services.update_source(9, Some("x"), None),
            Err(AuroraError::NotFound { .. })
        ));
        assert!(matches!(
            services.delete_source(9),
            Err(AuroraError::NotFound { .. })
        ));
        assert!(matches!(
            services.get_source(9),
            Err(AuroraError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_missing_artifact() {
        let services = services();

        assert!(matches!(
            services.dispatch_artifact(12),
            Err(AuroraError::NotFound {
                entity: "artifact",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_without_worker() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let orchestrator = CrawlOrchestrator::new(
            db.clone(),
            HttpFetcher::new(&config.fetcher).unwrap(),
            config.crawler.clone(),
            &config.fetcher.user_agent,
        );
        let services = Services::from_parts(
            db,
            orchestrator,
            IngestionCoordinator::builder().build(),
            None,
        );

        assert_eq!(services.shutdown().await.unwrap(), None);
    }
}
