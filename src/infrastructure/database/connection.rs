use diesel::{
    PgConnection,
    r2d2::{self, ConnectionManager, CustomizeConnection},
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use thiserror::Error;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Pool error: {0}")]
    PoolError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Blocking task failed: {0}")]
    TaskFailed(String),
}

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_size: u32,
    pub min_idle: Option<u32>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: Some(1),
        }
    }
}

pub fn create_connection_pool(
    database_url: &str,
    settings: &PoolSettings,
) -> Result<DbPool, DatabaseError> {
    if database_url.trim().is_empty() {
        return Err(DatabaseError::ConfigurationError(
            "DATABASE_URL is empty".to_string(),
        ));
    }

    let manager = ConnectionManager::<PgConnection>::new(database_url);

    r2d2::Pool::builder()
        .max_size(settings.max_size)
        .min_idle(settings.min_idle)
        .build(manager)
        .map_err(|e| DatabaseError::PoolError(e.to_string()))
}

/// Pool whose connections run every statement inside a transaction that is
/// never committed. Used by the database test suite.
pub fn create_test_pool(database_url: &str) -> Result<DbPool, DatabaseError> {
    #[derive(Debug)]
    struct TestTransaction;

    impl CustomizeConnection<PgConnection, r2d2::Error> for TestTransaction {
        fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
            use diesel::Connection;
            conn.begin_test_transaction()
                .map_err(r2d2::Error::QueryError)
        }
    }

    let manager = ConnectionManager::<PgConnection>::new(database_url);

    r2d2::Pool::builder()
        .max_size(1)
        .connection_customizer(Box::new(TestTransaction))
        .build(manager)
        .map_err(|e| DatabaseError::PoolError(e.to_string()))
}

pub fn get_connection_from_pool(pool: &DbPool) -> Result<DbConnection, DatabaseError> {
    pool.get()
        .map_err(|e| DatabaseError::PoolError(e.to_string()))
}

pub fn run_migrations(conn: &mut PgConnection) -> Result<(), DatabaseError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;
    Ok(())
}

/// Runs a diesel operation on the blocking pool with a pooled connection.
pub async fn with_connection<T, E, F>(pool: &DbPool, operation: F) -> Result<T, E>
where
    F: FnOnce(&mut PgConnection) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<DatabaseError> + Send + 'static,
{
    let pool = pool.clone();
    let task = tokio::task::spawn_blocking(move || {
        let mut conn = get_connection_from_pool(&pool)?;
        operation(&mut conn)
    });

    match task.await {
        Ok(result) => result,
        Err(e) => Err(DatabaseError::TaskFailed(e.to_string()).into()),
    }
}
