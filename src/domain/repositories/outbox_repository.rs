use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::OutboxEvent;

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("Outbox event not found: {0}")]
    NotFound(Uuid),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Which unprocessed point deletions to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionFilter {
    /// Never attempted, or attempted without a recorded failure.
    Pending,
    /// Retries exhausted; waiting for the sweep or an operator.
    Failed,
    Unprocessed,
}

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn append(&self, event: &OutboxEvent) -> Result<(), OutboxError>;

    /// Oldest first.
    async fn fetch_point_deletions(
        &self,
        filter: DeletionFilter,
        entity_uuid: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, OutboxError>;

    async fn mark_processed(&self, event_uuid: Uuid) -> Result<(), OutboxError>;

    /// Bumps the attempt counter and records why the latest round failed.
    async fn mark_attempt_failed(&self, event_uuid: Uuid, error: &str) -> Result<(), OutboxError>;
}
