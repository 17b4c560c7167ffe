//! Handler traits for source and artifact lifecycle events

use crate::storage::{Artifact, Source};
use crate::Result;
use rusqlite::Connection;

/// Reacts to lifecycle events of one source type
///
/// Every call receives the connection of the caller's open transaction, so
/// writes made here commit or roll back together with the source row.
pub trait SourceHandler: Send + Sync {
    fn on_created(&self, source: &Source, conn: &Connection) -> Result<()>;

    fn on_updated(&self, source: &Source, conn: &Connection) -> Result<()>;

    fn on_deleted(&self, source: &Source, conn: &Connection) -> Result<()>;
}

/// Accepts newly created artifacts for background processing
///
/// `enqueue` runs after the artifact row has committed and must return
/// without waiting for the artifact to be processed.
pub trait ArtifactHandler: Send + Sync {
    fn enqueue(&self, artifact: Artifact) -> Result<()>;
}

/// Artifact handler that only logs what it receives
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingArtifactHandler;

impl ArtifactHandler for LoggingArtifactHandler {
    fn enqueue(&self, artifact: Artifact) -> Result<()> {
        tracing::info!(
            "Artifact {} ({}, {} bytes) received, no processor configured",
            artifact.id,
            artifact.mime_type,
            artifact.size_bytes
        );
        Ok(())
    }
}
