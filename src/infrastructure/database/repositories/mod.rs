pub mod postgres_embedding_metadata_repository;
pub mod postgres_entity_repository;
pub mod postgres_outbox_repository;
pub mod postgres_sync_state_repository;
pub mod variant_store;

pub use postgres_embedding_metadata_repository::PostgresEmbeddingMetadataRepository;
pub use postgres_entity_repository::PostgresEntityRepository;
pub use postgres_outbox_repository::PostgresOutboxRepository;
pub use postgres_sync_state_repository::PostgresSyncStateRepository;
