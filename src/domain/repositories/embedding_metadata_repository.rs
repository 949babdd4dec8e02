use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{EmbeddingMetadata, EmbeddingSlot, NewEmbeddingMetadata};
use crate::domain::value_objects::{EmbeddingKind, PointId};

#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    #[error("Embedding slot {0} is already recorded")]
    SlotConflict(EmbeddingSlot),
    #[error("Point {0} is already recorded")]
    PointConflict(PointId),
    #[error("Entity not found: {0}")]
    EntityNotFound(Uuid),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl MetadataError {
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            MetadataError::SlotConflict(_) | MetadataError::PointConflict(_)
        )
    }
}

/// Minimal projection of a metadata row used when walking the whole index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointRef {
    pub point_id: PointId,
    pub entity_uuid: Uuid,
    pub embedding_kind: EmbeddingKind,
}

#[async_trait]
pub trait EmbeddingMetadataRepository: Send + Sync {
    /// Fails closed when the slot or the point is already taken, or when the
    /// entity no longer exists.
    async fn record(
        &self,
        request: NewEmbeddingMetadata,
    ) -> Result<EmbeddingMetadata, MetadataError>;

    /// Rows for one entity ordered by `(embedding_kind, chunk_index)`, fetched
    /// page by page. Each call starts over from the first page.
    fn list_for(&self, entity_uuid: Uuid) -> BoxStream<'static, Result<EmbeddingMetadata, MetadataError>>;

    /// Removes rows for the entity (optionally a single kind) and queues their
    /// points for external deletion in the same transaction.
    async fn invalidate(
        &self,
        entity_uuid: Uuid,
        embedding_kind: Option<EmbeddingKind>,
    ) -> Result<Vec<PointId>, MetadataError>;

    async fn delete_all_for(&self, entity_uuid: Uuid) -> Result<Vec<PointId>, MetadataError>;

    async fn find_by_point_id(
        &self,
        point_id: PointId,
    ) -> Result<Option<EmbeddingMetadata>, MetadataError>;

    /// Keyset page over every row ordered by point id.
    async fn list_point_ids(
        &self,
        after: Option<PointId>,
        limit: i64,
    ) -> Result<Vec<PointRef>, MetadataError>;

    async fn count(&self) -> Result<i64, MetadataError>;

    async fn count_by_model(&self, model_name: &str) -> Result<i64, MetadataError>;
}
