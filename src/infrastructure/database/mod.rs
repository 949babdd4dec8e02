pub mod connection;
pub mod errors;
pub mod models;
pub mod repositories;
pub mod schema;

pub use connection::{
    DatabaseError, DbConnection, DbPool, MIGRATIONS, PoolSettings, create_connection_pool,
    create_test_pool, get_connection_from_pool, run_migrations, with_connection,
};
pub use repositories::{
    PostgresEmbeddingMetadataRepository, PostgresEntityRepository, PostgresOutboxRepository,
    PostgresSyncStateRepository,
};
