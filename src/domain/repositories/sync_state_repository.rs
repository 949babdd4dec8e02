use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::EntitySyncStatus;
use crate::domain::value_objects::SyncState;

#[derive(Debug, Error)]
pub enum SyncStateError {
    #[error("Entity not found: {0}")]
    EntityNotFound(Uuid),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    async fn get(&self, entity_uuid: Uuid) -> Result<Option<EntitySyncStatus>, SyncStateError>;

    /// Upserts. Fails with `EntityNotFound` once the entity is gone.
    async fn put(&self, status: &EntitySyncStatus) -> Result<(), SyncStateError>;

    /// Rows whose state has the same discriminant as `state`, oldest first.
    async fn list_by_state(
        &self,
        state: &SyncState,
        limit: i64,
    ) -> Result<Vec<EntitySyncStatus>, SyncStateError>;
}
