use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::domain::entities::NewEmbeddingMetadata;
use crate::domain::repositories::{
    EntityRepositoryError, MetadataError, OutboxError, SyncStateError,
};
use crate::infrastructure::database::connection::DatabaseError;

pub const POINT_ID_CONSTRAINT: &str = "uq_embeddings_point_id";
pub const SLOT_CONSTRAINT: &str = "uq_embeddings_entity_kind_chunk";

/// Maps a failed metadata insert onto the conflict it represents.
pub fn classify_record_error(error: DieselError, request: &NewEmbeddingMetadata) -> MetadataError {
    match &error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            match info.constraint_name() {
                Some(POINT_ID_CONSTRAINT) => MetadataError::PointConflict(request.point_id),
                Some(SLOT_CONSTRAINT) => MetadataError::SlotConflict(request.slot()),
                _ => MetadataError::DatabaseError(error.to_string()),
            }
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            MetadataError::EntityNotFound(request.entity_uuid)
        }
        _ => MetadataError::DatabaseError(error.to_string()),
    }
}

pub fn is_foreign_key_violation(error: &DieselError) -> bool {
    matches!(
        error,
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)
    )
}

impl From<DatabaseError> for EntityRepositoryError {
    fn from(error: DatabaseError) -> Self {
        EntityRepositoryError::DatabaseError(error.to_string())
    }
}

impl From<DatabaseError> for MetadataError {
    fn from(error: DatabaseError) -> Self {
        MetadataError::DatabaseError(error.to_string())
    }
}

impl From<DatabaseError> for OutboxError {
    fn from(error: DatabaseError) -> Self {
        OutboxError::DatabaseError(error.to_string())
    }
}

impl From<DatabaseError> for SyncStateError {
    fn from(error: DatabaseError) -> Self {
        SyncStateError::DatabaseError(error.to_string())
    }
}

impl From<DieselError> for EntityRepositoryError {
    fn from(error: DieselError) -> Self {
        EntityRepositoryError::DatabaseError(error.to_string())
    }
}

impl From<DieselError> for MetadataError {
    fn from(error: DieselError) -> Self {
        MetadataError::DatabaseError(error.to_string())
    }
}

impl From<DieselError> for OutboxError {
    fn from(error: DieselError) -> Self {
        OutboxError::DatabaseError(error.to_string())
    }
}

impl From<DieselError> for SyncStateError {
    fn from(error: DieselError) -> Self {
        SyncStateError::DatabaseError(error.to_string())
    }
}

/// Metadata helpers reused inside an entity transaction.
impl From<MetadataError> for EntityRepositoryError {
    fn from(error: MetadataError) -> Self {
        match error {
            MetadataError::ValidationError(message) => EntityRepositoryError::ValidationError(message),
            other => EntityRepositoryError::DatabaseError(other.to_string()),
        }
    }
}
