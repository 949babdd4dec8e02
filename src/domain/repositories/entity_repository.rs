use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{DomainEntity, EntityRecord, EntityVariant};
use crate::domain::value_objects::{EmbeddingKind, EntityKind, PointId, SyncState};

#[derive(Debug, Error)]
pub enum EntityRepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(Uuid),
    #[error("Entity {uuid} is a {existing}, cannot store a {requested}")]
    KindMismatch {
        uuid: Uuid,
        existing: EntityKind,
        requested: EntityKind,
    },
    #[error("Identity allocation failed: {0}")]
    AllocationFailed(String),
    #[error("Entity {uuid} of kind {kind} has no variant row")]
    MissingVariant { uuid: Uuid, kind: EntityKind },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Outcome of a committed update. The content change, the removal of every
/// stale embedding kind and the `point_delete` events for its points landed in
/// one transaction.
#[derive(Debug, Clone)]
pub struct EntityUpdate {
    pub previous: DomainEntity,
    pub current: DomainEntity,
    pub invalidated_kinds: BTreeSet<EmbeddingKind>,
    pub queued_points: Vec<PointId>,
    /// Sync state before the update moved it to `PendingEmbed`. Only set when
    /// something was invalidated and a state row existed.
    pub prior_sync_state: Option<SyncState>,
}

impl EntityUpdate {
    pub fn went_stale(&self) -> bool {
        !self.invalidated_kinds.is_empty()
    }
}

/// Outcome of a relational delete. `queued_points` were written to the
/// outbox in the same transaction that removed the entity.
#[derive(Debug, Clone)]
pub struct EntityDeletion {
    pub record: EntityRecord,
    pub queued_points: Vec<PointId>,
}

#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Allocates an identity and inserts the variant row in one transaction.
    async fn create(&self, variant: &EntityVariant) -> Result<DomainEntity, EntityRepositoryError>;

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<DomainEntity>, EntityRepositoryError>;

    async fn exists(&self, uuid: Uuid) -> Result<bool, EntityRepositoryError>;

    /// Replaces the variant content and bumps `updated_at`. In the same
    /// transaction the metadata of every embedding kind fed by a changed field
    /// is removed, its points are queued for external deletion and the sync
    /// state moves to `PendingEmbed`. The kind is fixed at creation.
    async fn update(
        &self,
        uuid: Uuid,
        variant: &EntityVariant,
    ) -> Result<EntityUpdate, EntityRepositoryError>;

    /// Deletes the entity row. Variant, metadata and sync state go with it by
    /// cascade; every point the metadata referenced is queued for external
    /// deletion. `None` when the entity was already gone.
    async fn delete(&self, uuid: Uuid) -> Result<Option<EntityDeletion>, EntityRepositoryError>;

    async fn list_kind_updated_since(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<EntityRecord>, EntityRepositoryError>;

    async fn count_by_kind(&self) -> Result<Vec<(EntityKind, i64)>, EntityRepositoryError>;

    /// Entity rows with no matching variant row.
    async fn find_orphaned_entities(&self) -> Result<Vec<EntityRecord>, EntityRepositoryError>;
}
