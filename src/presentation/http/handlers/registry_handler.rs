use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::ports::reconcile_queue::{ReconcileJob, ReconcileQueue};
use crate::application::ports::vector_index::VectorIndex;
use crate::application::services::{
    EntityService, ReconcileOutcome, Reconciler, ReconciliationSweep, RegistryError,
};
use crate::domain::repositories::{DeletionFilter, OutboxRepository};
use crate::presentation::http::dto::{
    ApiResponse, EmbeddingMetadataDto, EntityEmbeddingsDto, FailedDeletionDto,
    FailedDeletionsDto, FailedDeletionsQuery, HealthResponseDto, SweepQuery, SyncStateDto,
};

const DEFAULT_FAILED_DELETIONS_LIMIT: i64 = 100;
const MAX_FAILED_DELETIONS_LIMIT: i64 = 1000;

fn status_for(error: &RegistryError) -> StatusCode {
    match error {
        RegistryError::EntityNotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        RegistryError::MetadataConflict(_) => StatusCode::CONFLICT,
        RegistryError::ExternalIndexUnavailable(_)
        | RegistryError::EmbeddingServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RegistryError::AllocationFailure(_)
        | RegistryError::OrphanDetected(_)
        | RegistryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response<T>(error: &RegistryError) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        status_for(error),
        Json(ApiResponse::error(
            error.code().to_string(),
            error.to_string(),
            None,
        )),
    )
}

fn entity_not_found<T>(entity_uuid: Uuid) -> (StatusCode, Json<ApiResponse<T>>) {
    error_response(&RegistryError::EntityNotFound(entity_uuid))
}

/// Admin surface over the registry: inspection of embeddings and sync state,
/// and manual triggers for the reconciler.
pub struct RegistryHandler {
    entity_service: Arc<EntityService>,
    reconciler: Arc<Reconciler>,
    sweep: Arc<ReconciliationSweep>,
    outbox: Arc<dyn OutboxRepository>,
    vector_index: Arc<dyn VectorIndex>,
    queue: Option<Arc<dyn ReconcileQueue>>,
}

impl RegistryHandler {
    pub fn new(
        entity_service: Arc<EntityService>,
        reconciler: Arc<Reconciler>,
        sweep: Arc<ReconciliationSweep>,
        outbox: Arc<dyn OutboxRepository>,
        vector_index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            entity_service,
            reconciler,
            sweep,
            outbox,
            vector_index,
            queue: None,
        }
    }

    pub fn with_queue(mut self, queue: Arc<dyn ReconcileQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub async fn health(
        State(handler): State<Arc<RegistryHandler>>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let vector_index = match handler.vector_index.health_check().await {
            Ok(true) => "up",
            Ok(false) => "down",
            Err(e) => {
                warn!(error = %e, "Vector index health check failed");
                "unreachable"
            }
        };

        let queue = match &handler.queue {
            Some(queue) => queue.health_check().await.ok(),
            None => None,
        };
        let queue_healthy = queue.as_ref().is_none_or(|q| q.is_healthy);

        // Index outages degrade the registry but never take it down.
        let status = if vector_index == "up" && queue_healthy {
            "healthy"
        } else {
            "degraded"
        };

        Ok((
            StatusCode::OK,
            Json(ApiResponse::success(HealthResponseDto {
                status: status.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                vector_index: vector_index.to_string(),
                queue,
            })),
        ))
    }

    pub async fn get_embeddings(
        State(handler): State<Arc<RegistryHandler>>,
        Path(entity_uuid): Path<Uuid>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let entity = match handler.entity_service.get(entity_uuid).await {
            Ok(Some(entity)) => entity,
            Ok(None) => return Ok(entity_not_found(entity_uuid)),
            Err(e) => return Ok(error_response(&e)),
        };

        match handler.entity_service.embeddings_for(entity_uuid).await {
            Ok(rows) => {
                let embeddings: Vec<EmbeddingMetadataDto> =
                    rows.iter().map(EmbeddingMetadataDto::from).collect();
                Ok((
                    StatusCode::OK,
                    Json(ApiResponse::success(EntityEmbeddingsDto {
                        entity_uuid,
                        entity_kind: entity.kind().as_str().to_string(),
                        total: embeddings.len(),
                        embeddings,
                    })),
                ))
            }
            Err(e) => Ok(error_response(&e)),
        }
    }

    pub async fn get_sync_state(
        State(handler): State<Arc<RegistryHandler>>,
        Path(entity_uuid): Path<Uuid>,
    ) -> Result<impl IntoResponse, StatusCode> {
        match handler.reconciler.sync_status(entity_uuid).await {
            Ok(Some(status)) => Ok((
                StatusCode::OK,
                Json(ApiResponse::success(SyncStateDto::from(&status))),
            )),
            Ok(None) => Ok((
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(
                    "SYNC_STATE_NOT_FOUND".to_string(),
                    format!("No sync state recorded for entity {}", entity_uuid),
                    None,
                )),
            )),
            Err(e) => Ok(error_response(&e)),
        }
    }

    /// Runs the reconciler for one entity inside the request.
    pub async fn reconcile_entity(
        State(handler): State<Arc<RegistryHandler>>,
        Path(entity_uuid): Path<Uuid>,
    ) -> Result<impl IntoResponse, StatusCode> {
        info!(%entity_uuid, "Manual reconcile requested");

        match handler.reconciler.reconcile_entity(entity_uuid).await {
            Ok(ReconcileOutcome::EntityMissing) => Ok(entity_not_found(entity_uuid)),
            Ok(outcome) => Ok((StatusCode::OK, Json(ApiResponse::success(outcome)))),
            Err(e) => Ok(error_response(&e)),
        }
    }

    pub async fn run_sweep(
        State(handler): State<Arc<RegistryHandler>>,
        Query(query): Query<SweepQuery>,
    ) -> Result<impl IntoResponse, StatusCode> {
        if !query.wait.unwrap_or(false) {
            if let Some(queue) = &handler.queue {
                match queue.enqueue(ReconcileJob::Sweep).await {
                    Ok(()) => {
                        return Ok((
                            StatusCode::ACCEPTED,
                            Json(ApiResponse::success(serde_json::json!({
                                "queued": true
                            }))),
                        ));
                    }
                    Err(e) => warn!(error = %e, "Could not queue sweep, running inline"),
                }
            }
        }

        match handler.sweep.run().await {
            Ok(report) => match serde_json::to_value(&report) {
                Ok(report) => Ok((StatusCode::OK, Json(ApiResponse::success(report)))),
                Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
            },
            Err(e) => Ok(error_response(&e)),
        }
    }

    pub async fn list_failed_deletions(
        State(handler): State<Arc<RegistryHandler>>,
        Query(query): Query<FailedDeletionsQuery>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_FAILED_DELETIONS_LIMIT)
            .clamp(1, MAX_FAILED_DELETIONS_LIMIT);

        match handler
            .outbox
            .fetch_point_deletions(DeletionFilter::Failed, query.entity_uuid, limit)
            .await
        {
            Ok(events) => {
                let deletions: Vec<FailedDeletionDto> =
                    events.iter().map(FailedDeletionDto::from).collect();
                Ok((
                    StatusCode::OK,
                    Json(ApiResponse::success(FailedDeletionsDto {
                        total: deletions.len(),
                        deletions,
                    })),
                ))
            }
            Err(e) => Ok(error_response(&RegistryError::from(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{ReconcilerSettings, RetryPolicy};
    use crate::domain::entities::EntityVariant;
    use crate::domain::entities::variants::Skill;
    use crate::infrastructure::memory::{
        HashingEmbeddingProvider, InMemoryEventSink, InMemoryRegistry, InMemoryVectorIndex,
    };
    use crate::presentation::http::routes::api_routes;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    struct Fixture {
        index: Arc<InMemoryVectorIndex>,
        entity_service: Arc<EntityService>,
        app: Router,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(InMemoryRegistry::new());
        let index = Arc::new(InMemoryVectorIndex::new());
        let reconciler = Arc::new(Reconciler::new(
            registry.clone(),
            registry.clone(),
            registry.clone(),
            registry.clone(),
            index.clone(),
            Arc::new(HashingEmbeddingProvider::new(8)),
            Arc::new(InMemoryEventSink::new()),
            ReconcilerSettings {
                retry: RetryPolicy::no_retry(Duration::from_millis(200)),
                ..ReconcilerSettings::default()
            },
        ));
        let sweep = Arc::new(ReconciliationSweep::new(
            registry.clone(),
            registry.clone(),
            registry.clone(),
            index.clone(),
            reconciler.clone(),
        ));
        let entity_service = Arc::new(EntityService::new(
            registry.clone(),
            registry.clone(),
            reconciler.clone(),
        ));
        let handler = Arc::new(RegistryHandler::new(
            entity_service.clone(),
            reconciler,
            sweep,
            registry,
            index.clone(),
        ));

        Fixture {
            index,
            entity_service,
            app: api_routes(handler),
        }
    }

    fn skill() -> EntityVariant {
        EntityVariant::Skill(Skill {
            profile_id: 7,
            category: Some("Databases".to_string()),
            name: Some("PostgreSQL".to_string()),
            proficiency: Some("Advanced".to_string()),
        })
    }

    async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_embeddings_listed_in_kind_order() {
        let f = fixture();
        let entity = f.entity_service.create(skill()).await.unwrap();

        let (status, body) = call(
            &f.app,
            "GET",
            &format!("/entities/{}/embeddings", entity.uuid()),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["entity_kind"], "skill");
        let embeddings = body["data"]["embeddings"].as_array().unwrap();
        assert!(!embeddings.is_empty());
        assert_eq!(body["data"]["total"], embeddings.len());
        assert_eq!(embeddings[0]["embedding_kind"], "full_text");
        assert_eq!(embeddings[0]["chunk_index"], 0);
        for row in embeddings {
            let point = Uuid::parse_str(row["point_id"].as_str().unwrap()).unwrap();
            assert!(f.index.contains(crate::domain::value_objects::PointId::from_uuid(point)));
        }
    }

    #[tokio::test]
    async fn test_unknown_entity_is_not_found() {
        let f = fixture();
        let missing = Uuid::new_v4();

        let (status, body) =
            call(&f.app, "GET", &format!("/entities/{}/embeddings", missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "ENTITY_NOT_FOUND");

        let (status, body) =
            call(&f.app, "GET", &format!("/entities/{}/sync-state", missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "SYNC_STATE_NOT_FOUND");

        let (status, _) =
            call(&f.app, "POST", &format!("/entities/{}/reconcile", missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_reconcile_is_reported_as_state() {
        let f = fixture();
        f.index.set_available(false);
        let entity = f.entity_service.create(skill()).await.unwrap();

        let (status, body) = call(
            &f.app,
            "GET",
            &format!("/entities/{}/sync-state", entity.uuid()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "failed");
        assert!(body["data"]["last_error"].is_string());

        f.index.set_available(true);
        let (status, body) = call(
            &f.app,
            "POST",
            &format!("/entities/{}/reconcile", entity.uuid()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "in_sync");

        let (_, body) = call(
            &f.app,
            "GET",
            &format!("/entities/{}/sync-state", entity.uuid()),
        )
        .await;
        assert_eq!(body["data"]["state"], "in_sync");
        assert_eq!(body["data"]["attempts"], 0);
    }

    #[tokio::test]
    async fn test_failed_deletions_listed_until_sweep_clears_them() {
        let f = fixture();
        let entity = f.entity_service.create(skill()).await.unwrap();

        f.index.set_available(false);
        f.entity_service.delete(entity.uuid()).await.unwrap();

        let (status, body) = call(&f.app, "GET", "/reconcile/failed-deletions").await;
        assert_eq!(status, StatusCode::OK);
        let total = body["data"]["total"].as_u64().unwrap();
        assert!(total > 0);
        assert_eq!(
            body["data"]["deletions"][0]["entity_uuid"],
            entity.uuid().to_string()
        );

        let (_, body) = call(
            &f.app,
            "GET",
            &format!("/reconcile/failed-deletions?entity_uuid={}", Uuid::new_v4()),
        )
        .await;
        assert_eq!(body["data"]["total"], 0);

        f.index.set_available(true);
        let (status, body) = call(&f.app, "POST", "/reconcile/sweep?wait=true").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["deletions"]["deleted"].as_u64().unwrap() >= total);

        let (_, body) = call(&f.app, "GET", "/reconcile/failed-deletions").await;
        assert_eq!(body["data"]["total"], 0);
        assert!(f.index.is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_degraded_index() {
        let f = fixture();

        let (status, body) = call(&f.app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");

        f.index.set_available(false);
        let (status, body) = call(&f.app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "degraded");
    }
}
