pub mod embedding_metadata;
pub mod entity;
pub mod outbox_event;
pub mod sync_status;
pub mod variants;

pub use embedding_metadata::{EmbeddingMetadata, EmbeddingSlot, NewEmbeddingMetadata, Provenance};
pub use entity::{DomainEntity, EntityIdentity, EntityRecord};
pub use outbox_event::{OutboxEvent, OutboxEventType};
pub use sync_status::EntitySyncStatus;
pub use variants::EntityVariant;
