//! Ingestion lifecycle dispatch
//!
//! This module routes "source created/updated/deleted" and "artifact
//! created" events to handlers registered by source type or MIME type:
//! - `IngestionCoordinator` holds the dispatch tables
//! - `WebSourceHandler` keeps a Site in sync with each "web" source
//! - `ArtifactQueue` moves artifact processing onto a background task

mod coordinator;
mod handler;
mod queue;
mod web_source;

pub use coordinator::{IngestionCoordinator, IngestionCoordinatorBuilder, WILDCARD_MIME};
pub use handler::{ArtifactHandler, LoggingArtifactHandler, SourceHandler};
pub use queue::{ArtifactProcessor, ArtifactQueue, LoggingProcessor, QueueError, WorkerReport};
pub use web_source::{WebSourceConfig, WebSourceHandler, SOURCE_TYPE as WEB_SOURCE_TYPE};
