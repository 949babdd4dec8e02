use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReconcileQueueError {
    #[error("Reconcile queue is closed")]
    Closed,
    #[error("Reconcile queue is full")]
    QueueFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum ReconcileJob {
    /// Bring one entity's embeddings in line with its content.
    Embed { entity_uuid: Uuid },
    /// Drain queued point deletions, for one entity or all of them.
    PurgePoints { entity_uuid: Option<Uuid> },
    Sweep,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub queue_size: usize,
    pub total_enqueued: u64,
    pub total_dequeued: u64,
    pub is_healthy: bool,
    pub last_activity: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ReconcileQueue: Send + Sync {
    async fn enqueue(&self, job: ReconcileJob) -> Result<(), ReconcileQueueError>;

    async fn size(&self) -> Result<usize, ReconcileQueueError>;

    async fn health_check(&self) -> Result<QueueHealth, ReconcileQueueError>;
}
