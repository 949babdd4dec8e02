use std::sync::Arc;

use tracing::info;

use crate::{
    application::{
        ports::{EmbeddingProvider, ReconcileEventSink, ReconcileQueue, VectorIndex},
        services::{
            EntityService, FanoutEventSink, ReconciliationSweep, Reconciler, TracingEventSink,
        },
    },
    config::AppConfig,
    domain::repositories::{
        EmbeddingMetadataRepository, EntityRepository, OutboxRepository, SyncStateRepository,
    },
    infrastructure::{
        database::{
            PostgresEmbeddingMetadataRepository, PostgresEntityRepository,
            PostgresOutboxRepository, PostgresSyncStateRepository, create_connection_pool,
            get_connection_from_pool, run_migrations,
        },
        external_services::{InferenceClient, InferenceEmbeddingProvider, QdrantVectorIndex},
        messaging::{
            BackgroundProcessor, MpscReconcileQueue, OutboxEventSink,
            mpsc_reconcile_queue::DEFAULT_QUEUE_CAPACITY,
        },
    },
    presentation::http::handlers::RegistryHandler,
};

pub struct AppContainer {
    // Repositories
    pub entity_repository: Arc<dyn EntityRepository>,
    pub metadata_repository: Arc<dyn EmbeddingMetadataRepository>,
    pub sync_state_repository: Arc<dyn SyncStateRepository>,
    pub outbox_repository: Arc<dyn OutboxRepository>,

    // External Services
    pub vector_index: Arc<dyn VectorIndex>,
    pub embedding_provider: Arc<dyn EmbeddingProvider>,

    // Reconcile Queue and Background Processing
    pub reconcile_queue: Arc<dyn ReconcileQueue>,
    pub background_processor: Arc<BackgroundProcessor>,

    // Application Services
    pub reconciler: Arc<Reconciler>,
    pub sweep: Arc<ReconciliationSweep>,
    pub entity_service: Arc<EntityService>,

    // HTTP Handlers
    pub registry_handler: Arc<RegistryHandler>,
}

impl AppContainer {
    pub async fn new(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        // Create database connection pool
        let db_pool = create_connection_pool(&config.database_url, &config.pool_settings())?;
        let mut conn = get_connection_from_pool(&db_pool)
            .map_err(|e| format!("Failed to create database connection: {}", e))?;
        run_migrations(&mut conn).map_err(|e| format!("Failed to run database migrations: {}", e))?;
        drop(conn);

        // Create repositories
        let entity_repository: Arc<dyn EntityRepository> =
            Arc::new(PostgresEntityRepository::new(db_pool.clone()));
        let metadata_repository: Arc<dyn EmbeddingMetadataRepository> =
            Arc::new(PostgresEmbeddingMetadataRepository::new(db_pool.clone()));
        let sync_state_repository: Arc<dyn SyncStateRepository> =
            Arc::new(PostgresSyncStateRepository::new(db_pool.clone()));
        let outbox_repository: Arc<dyn OutboxRepository> =
            Arc::new(PostgresOutboxRepository::new(db_pool));

        // Create external services
        let vector_index: Arc<dyn VectorIndex> =
            Arc::new(QdrantVectorIndex::new(config.qdrant_config())?);
        let embedding_provider: Arc<dyn EmbeddingProvider> = Arc::new(
            InferenceEmbeddingProvider::new(InferenceClient::new(
                config.embeddings_client_config(),
            )?),
        );

        let tracing_sink: Arc<dyn ReconcileEventSink> = Arc::new(TracingEventSink);
        let event_sink: Arc<dyn ReconcileEventSink> = Arc::new(
            FanoutEventSink::new(vec![tracing_sink])
                .with(Arc::new(OutboxEventSink::new(outbox_repository.clone()))),
        );

        // Create application services
        let reconciler = Arc::new(Reconciler::new(
            entity_repository.clone(),
            metadata_repository.clone(),
            sync_state_repository.clone(),
            outbox_repository.clone(),
            vector_index.clone(),
            embedding_provider.clone(),
            event_sink,
            config.reconciler_settings(),
        ));

        let sweep = Arc::new(ReconciliationSweep::new(
            entity_repository.clone(),
            metadata_repository.clone(),
            sync_state_repository.clone(),
            vector_index.clone(),
            reconciler.clone(),
        ));

        // Create reconcile queue and background processor
        let (reconcile_queue, job_receiver) =
            MpscReconcileQueue::create_pair(DEFAULT_QUEUE_CAPACITY);
        let reconcile_queue: Arc<dyn ReconcileQueue> = Arc::new(reconcile_queue);

        let background_processor = Arc::new(
            BackgroundProcessor::new(Arc::new(job_receiver), reconciler.clone(), sweep.clone())
                .with_worker_count(config.reconcile_workers)
                .with_sweep_interval(config.sweep_interval()),
        );

        let entity_service = Arc::new(
            EntityService::new(
                entity_repository.clone(),
                metadata_repository.clone(),
                reconciler.clone(),
            )
            .with_queue(reconcile_queue.clone()),
        );

        // Create HTTP handlers
        let registry_handler = Arc::new(
            RegistryHandler::new(
                entity_service.clone(),
                reconciler.clone(),
                sweep.clone(),
                outbox_repository.clone(),
                vector_index.clone(),
            )
            .with_queue(reconcile_queue.clone()),
        );

        info!(
            qdrant_url = %config.qdrant_url,
            collection = %config.qdrant_collection,
            model = %config.embedding_model_name,
            "Registry container ready"
        );

        Ok(Self {
            entity_repository,
            metadata_repository,
            sync_state_repository,
            outbox_repository,
            vector_index,
            embedding_provider,
            reconcile_queue,
            background_processor,
            reconciler,
            sweep,
            entity_service,
            registry_handler,
        })
    }
}
