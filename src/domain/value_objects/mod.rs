pub mod content_hash;
pub mod embedding_kind;
pub mod entity_kind;
pub mod point_id;
pub mod sync_state;

pub use content_hash::ContentHash;
pub use embedding_kind::EmbeddingKind;
pub use entity_kind::EntityKind;
pub use point_id::PointId;
pub use sync_state::SyncState;
