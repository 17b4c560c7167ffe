//! Background artifact queue
//!
//! A bounded channel feeding a single worker task. `enqueue` never waits:
//! when the buffer is full the artifact is rejected and the caller decides
//! what to do. The worker processes each artifact id at most once
//! successfully; a failed attempt may be retried by enqueueing again.

use crate::ingestion::ArtifactHandler;
use crate::storage::Artifact;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Errors returned when handing an artifact to the queue
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full (capacity {0})")]
    Full(usize),

    #[error("queue worker has stopped")]
    Closed,
}

/// Does the actual work for one artifact
#[async_trait]
pub trait ArtifactProcessor: Send + Sync {
    async fn process(&self, artifact: &Artifact) -> Result<()>;
}

/// Processor that only logs each artifact
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProcessor;

#[async_trait]
impl ArtifactProcessor for LoggingProcessor {
    async fn process(&self, artifact: &Artifact) -> Result<()> {
        tracing::info!(
            "Processed artifact {} ({}, {})",
            artifact.id,
            artifact.mime_type,
            artifact.path
        );
        Ok(())
    }
}

/// Counters reported by the worker when the queue shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub processed: u64,
    pub duplicates: u64,
    pub failed: u64,
}

/// Channel-backed `ArtifactHandler`
#[derive(Debug, Clone)]
pub struct ArtifactQueue {
    sender: mpsc::Sender<Artifact>,
    capacity: usize,
}

impl ArtifactQueue {
    /// Starts the worker task and returns the queue handle
    ///
    /// Must be called from within a tokio runtime. The worker exits, yielding
    /// its report, once every clone of the queue has been dropped.
    pub fn spawn(
        capacity: usize,
        processor: Arc<dyn ArtifactProcessor>,
    ) -> (Self, JoinHandle<WorkerReport>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let worker = tokio::spawn(run_worker(receiver, processor));

        (Self { sender, capacity }, worker)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl ArtifactHandler for ArtifactQueue {
    fn enqueue(&self, artifact: Artifact) -> Result<()> {
        let id = artifact.id;
        match self.sender.try_send(artifact) {
            Ok(()) => {
                tracing::debug!("Queued artifact {}", id);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Artifact queue full, rejected artifact {}", id);
                Err(QueueError::Full(self.capacity).into())
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::Closed.into()),
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Artifact>,
    processor: Arc<dyn ArtifactProcessor>,
) -> WorkerReport {
    let mut seen = HashSet::new();
    let mut report = WorkerReport::default();

    while let Some(artifact) = receiver.recv().await {
        if !seen.insert(artifact.id) {
            tracing::debug!("Skipping duplicate artifact {}", artifact.id);
            report.duplicates += 1;
            continue;
        }

        match processor.process(&artifact).await {
            Ok(()) => report.processed += 1,
            Err(e) => {
                tracing::warn!("Processing artifact {} failed: {}", artifact.id, e);
                seen.remove(&artifact.id);
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        "Artifact worker stopped: {} processed, {} duplicates, {} failed",
        report.processed,
        report.duplicates,
        report.failed
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ArtifactKind;
    use crate::AuroraError;
    use chrono::Utc;
    use std::sync::Mutex;
    use tokio::sync::{Notify, Semaphore};

    fn artifact(id: i64) -> Artifact {
        Artifact {
            id,
            source_id: 1,
            kind: ArtifactKind::Upload,
            mime_type: "application/pdf".to_string(),
            path: format!("/data/{}.pdf", id),
            size_bytes: 1,
            created_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct Collect {
        ids: Mutex<Vec<i64>>,
        fail_once: Mutex<HashSet<i64>>,
    }

    #[async_trait]
    impl ArtifactProcessor for Collect {
        async fn process(&self, artifact: &Artifact) -> Result<()> {
            if self.fail_once.lock().unwrap().remove(&artifact.id) {
                return Err(AuroraError::InvalidSourceConfig("transient".to_string()));
            }
            self.ids.lock().unwrap().push(artifact.id);
            Ok(())
        }
    }

    /// Blocks inside `process` until the test releases it
    struct Gate {
        started: Notify,
        release: Semaphore,
    }

    #[async_trait]
    impl ArtifactProcessor for Gate {
        async fn process(&self, _artifact: &Artifact) -> Result<()> {
            self.started.notify_one();
            let permit = self.release.acquire().await;
            drop(permit);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_processes_in_order() {
        let processor = Arc::new(Collect::default());
        let (queue, worker) = ArtifactQueue::spawn(8, processor.clone());

        for id in 1..=3 {
            queue.enqueue(artifact(id)).unwrap();
        }
        drop(queue);

        let report = worker.await.unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(*processor.ids.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_duplicates_skipped() {
        let processor = Arc::new(Collect::default());
        let (queue, worker) = ArtifactQueue::spawn(8, processor.clone());

        queue.enqueue(artifact(7)).unwrap();
        queue.enqueue(artifact(7)).unwrap();
        drop(queue);

        let report = worker.await.unwrap();
        assert_eq!(
            report,
            WorkerReport {
                processed: 1,
                duplicates: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_failed_artifact_can_be_retried() {
        let processor = Arc::new(Collect::default());
        processor.fail_once.lock().unwrap().insert(4);
        let (queue, worker) = ArtifactQueue::spawn(8, processor.clone());

        queue.enqueue(artifact(4)).unwrap();
        queue.enqueue(artifact(4)).unwrap();
        drop(queue);

        let report = worker.await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(*processor.ids.lock().unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_waiting() {
        let gate = Arc::new(Gate {
            started: Notify::new(),
            release: Semaphore::new(0),
        });
        let (queue, worker) = ArtifactQueue::spawn(1, gate.clone());

        // First artifact is taken by the worker, which then blocks
        queue.enqueue(artifact(1)).unwrap();
        gate.started.notified().await;

        // Second fills the buffer, third has nowhere to go
        queue.enqueue(artifact(2)).unwrap();
        let result = queue.enqueue(artifact(3));
        assert!(matches!(
            result,
            Err(AuroraError::Queue(QueueError::Full(1)))
        ));

        gate.release.add_permits(2);
        drop(queue);
        let report = worker.await.unwrap();
        assert_eq!(report.processed, 2);
    }

    #[tokio::test]
    async fn test_stopped_worker_is_closed() {
        let (queue, worker) = ArtifactQueue::spawn(4, Arc::new(LoggingProcessor));
        worker.abort();
        let _ = worker.await;

        let result = queue.enqueue(artifact(1));
        assert!(matches!(result, Err(AuroraError::Queue(QueueError::Closed))));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        let (queue, _worker) = ArtifactQueue::spawn(0, Arc::new(LoggingProcessor));
        assert_eq!(queue.capacity(), 1);
    }
}
