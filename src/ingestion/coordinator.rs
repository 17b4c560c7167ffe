//! Lifecycle event dispatch
//!
//! Maps source types to `SourceHandler`s and MIME types to
//! `ArtifactHandler`s. The tables are fixed once the coordinator is built.

use crate::ingestion::{ArtifactHandler, SourceHandler};
use crate::storage::{Artifact, Source};
use crate::{AuroraError, Result};
use rusqlite::Connection;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// MIME key that matches any artifact without a more specific handler
pub const WILDCARD_MIME: &str = "*";

/// Routes lifecycle events to the handler registered for their type
#[derive(Clone, Default)]
pub struct IngestionCoordinator {
    source_handlers: HashMap<String, Arc<dyn SourceHandler>>,
    artifact_handlers: HashMap<String, Arc<dyn ArtifactHandler>>,
}

impl fmt::Debug for IngestionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut source_types: Vec<_> = self.source_handlers.keys().collect();
        let mut mime_types: Vec<_> = self.artifact_handlers.keys().collect();
        source_types.sort();
        mime_types.sort();

        f.debug_struct("IngestionCoordinator")
            .field("source_types", &source_types)
            .field("mime_types", &mime_types)
            .finish()
    }
}

impl IngestionCoordinator {
    pub fn builder() -> IngestionCoordinatorBuilder {
        IngestionCoordinatorBuilder::default()
    }

    pub fn on_source_created(&self, source: &Source, conn: &Connection) -> Result<()> {
        self.source_handler(source)?.on_created(source, conn)
    }

    pub fn on_source_updated(&self, source: &Source, conn: &Connection) -> Result<()> {
        self.source_handler(source)?.on_updated(source, conn)
    }

    pub fn on_source_deleted(&self, source: &Source, conn: &Connection) -> Result<()> {
        self.source_handler(source)?.on_deleted(source, conn)
    }

    /// Hands a committed artifact to the handler for its MIME type
    ///
    /// Falls back to the wildcard handler when no exact match exists.
    pub fn on_artifact_created(&self, artifact: Artifact) -> Result<()> {
        let key = mime_key(&artifact.mime_type);
        let handler = self
            .artifact_handlers
            .get(&key)
            .or_else(|| self.artifact_handlers.get(WILDCARD_MIME))
            .ok_or_else(|| AuroraError::NoHandlerRegistered {
                kind: "MIME type",
                key: artifact.mime_type.clone(),
            })?;

        tracing::debug!("Dispatching artifact {} ({})", artifact.id, key);
        handler.enqueue(artifact)
    }

    fn source_handler(&self, source: &Source) -> Result<&Arc<dyn SourceHandler>> {
        self.source_handlers
            .get(&source.source_type)
            .ok_or_else(|| AuroraError::NoHandlerRegistered {
                kind: "source type",
                key: source.source_type.clone(),
            })
    }
}

/// Normalizes a MIME type for lookup: lowercase, parameters removed
fn mime_key(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Builder for `IngestionCoordinator`
#[derive(Default)]
pub struct IngestionCoordinatorBuilder {
    source_handlers: HashMap<String, Arc<dyn SourceHandler>>,
    artifact_handlers: HashMap<String, Arc<dyn ArtifactHandler>>,
}

impl IngestionCoordinatorBuilder {
    /// Registers the handler for a source type, replacing any previous one
    pub fn source_handler(
        mut self,
        source_type: &str,
        handler: Arc<dyn SourceHandler>,
    ) -> Self {
        tracing::info!("Registered source handler: {}", source_type);
        self.source_handlers
            .insert(source_type.to_string(), handler);
        self
    }

    /// Registers the handler for a MIME type (or `WILDCARD_MIME`)
    pub fn artifact_handler(mut self, mime_type: &str, handler: Arc<dyn ArtifactHandler>) -> Self {
        let key = mime_key(mime_type);
        tracing::info!("Registered artifact handler: {}", key);
        self.artifact_handlers.insert(key, handler);
        self
    }

    pub fn build(self) -> IngestionCoordinator {
        IngestionCoordinator {
            source_handlers: self.source_handlers,
            artifact_handlers: self.artifact_handlers,
        }
    }
}
