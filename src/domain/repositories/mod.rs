pub mod embedding_metadata_repository;
pub mod entity_repository;
pub mod outbox_repository;
pub mod sync_state_repository;

pub use embedding_metadata_repository::{EmbeddingMetadataRepository, MetadataError, PointRef};
pub use entity_repository::{
    EntityDeletion, EntityRepository, EntityRepositoryError, EntityUpdate,
};
pub use outbox_repository::{DeletionFilter, OutboxError, OutboxRepository};
pub use sync_state_repository::{SyncStateError, SyncStateRepository};
