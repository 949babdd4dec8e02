use thiserror::Error;
use uuid::Uuid;

use crate::application::ports::embedding_provider::EmbeddingProviderError;
use crate::application::ports::reconcile_queue::ReconcileQueueError;
use crate::application::ports::vector_index::VectorIndexError;
use crate::domain::repositories::{
    EntityRepositoryError, MetadataError, OutboxError, SyncStateError,
};

/// Errors surfaced by the registry services.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The entity row or its variant could not be written; nothing was committed.
    #[error("Identity allocation failed: {0}")]
    AllocationFailure(String),
    #[error("Embedding metadata conflict: {0}")]
    MetadataConflict(String),
    #[error("Vector index unavailable: {0}")]
    ExternalIndexUnavailable(String),
    #[error("Embedding service unavailable: {0}")]
    EmbeddingServiceUnavailable(String),
    #[error("Orphan detected: {0}")]
    OrphanDetected(String),
    #[error("Entity not found: {0}")]
    EntityNotFound(Uuid),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl RegistryError {
    /// Stable code used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::AllocationFailure(_) => "ALLOCATION_FAILURE",
            RegistryError::MetadataConflict(_) => "METADATA_CONFLICT",
            RegistryError::ExternalIndexUnavailable(_) => "EXTERNAL_INDEX_UNAVAILABLE",
            RegistryError::EmbeddingServiceUnavailable(_) => "EMBEDDING_SERVICE_UNAVAILABLE",
            RegistryError::OrphanDetected(_) => "ORPHAN_DETECTED",
            RegistryError::EntityNotFound(_) => "ENTITY_NOT_FOUND",
            RegistryError::InvalidRequest(_) => "INVALID_REQUEST",
            RegistryError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<EntityRepositoryError> for RegistryError {
    fn from(error: EntityRepositoryError) -> Self {
        match error {
            EntityRepositoryError::NotFound(uuid) => RegistryError::EntityNotFound(uuid),
            EntityRepositoryError::AllocationFailed(msg) => RegistryError::AllocationFailure(msg),
            e @ EntityRepositoryError::MissingVariant { .. } => {
                RegistryError::OrphanDetected(e.to_string())
            }
            e @ (EntityRepositoryError::KindMismatch { .. }
            | EntityRepositoryError::ValidationError(_)) => {
                RegistryError::InvalidRequest(e.to_string())
            }
            EntityRepositoryError::DatabaseError(msg) => RegistryError::Storage(msg),
        }
    }
}

impl From<MetadataError> for RegistryError {
    fn from(error: MetadataError) -> Self {
        match error {
            e @ (MetadataError::SlotConflict(_) | MetadataError::PointConflict(_)) => {
                RegistryError::MetadataConflict(e.to_string())
            }
            MetadataError::EntityNotFound(uuid) => RegistryError::EntityNotFound(uuid),
            MetadataError::ValidationError(msg) => RegistryError::InvalidRequest(msg),
            MetadataError::DatabaseError(msg) => RegistryError::Storage(msg),
        }
    }
}

impl From<OutboxError> for RegistryError {
    fn from(error: OutboxError) -> Self {
        RegistryError::Storage(error.to_string())
    }
}

impl From<SyncStateError> for RegistryError {
    fn from(error: SyncStateError) -> Self {
        match error {
            SyncStateError::EntityNotFound(uuid) => RegistryError::EntityNotFound(uuid),
            e => RegistryError::Storage(e.to_string()),
        }
    }
}

impl From<VectorIndexError> for RegistryError {
    fn from(error: VectorIndexError) -> Self {
        RegistryError::ExternalIndexUnavailable(error.to_string())
    }
}

impl From<EmbeddingProviderError> for RegistryError {
    fn from(error: EmbeddingProviderError) -> Self {
        RegistryError::EmbeddingServiceUnavailable(error.to_string())
    }
}

impl From<ReconcileQueueError> for RegistryError {
    fn from(error: ReconcileQueueError) -> Self {
        RegistryError::Storage(error.to_string())
    }
}
