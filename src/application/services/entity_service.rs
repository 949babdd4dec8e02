use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::ports::reconcile_queue::{ReconcileJob, ReconcileQueue};
use crate::application::services::errors::RegistryError;
use crate::application::services::reconciler::Reconciler;
use crate::domain::entities::{DomainEntity, EmbeddingMetadata, EntityRecord, EntityVariant};
use crate::domain::repositories::{EmbeddingMetadataRepository, EntityRepository};
use crate::domain::value_objects::{EmbeddingKind, EntityKind, PointId};

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedEntity {
    pub entity: DomainEntity,
    pub invalidated_kinds: BTreeSet<EmbeddingKind>,
    pub queued_points: Vec<PointId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedEntity {
    pub record: EntityRecord,
    pub queued_points: Vec<PointId>,
}

/// Write path used by the owning feature modules. Each relational change is
/// one transaction, committed before any embedding work is scheduled; that
/// work runs on the queue when one is attached, inline otherwise.
pub struct EntityService {
    entities: Arc<dyn EntityRepository>,
    metadata: Arc<dyn EmbeddingMetadataRepository>,
    reconciler: Arc<Reconciler>,
    queue: Option<Arc<dyn ReconcileQueue>>,
}

impl EntityService {
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        metadata: Arc<dyn EmbeddingMetadataRepository>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            entities,
            metadata,
            reconciler,
            queue: None,
        }
    }

    pub fn with_queue(mut self, queue: Arc<dyn ReconcileQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub async fn create(&self, variant: EntityVariant) -> Result<DomainEntity, RegistryError> {
        let entity = self.entities.create(&variant).await?;
        info!(entity_uuid = %entity.uuid(), kind = %entity.kind(), "Entity created");

        self.reconciler
            .mark_pending(entity.uuid(), Some(entity.kind()))
            .await?;
        self.schedule(ReconcileJob::Embed {
            entity_uuid: entity.uuid(),
        })
        .await;

        Ok(entity)
    }

    pub async fn get(&self, uuid: Uuid) -> Result<Option<DomainEntity>, RegistryError> {
        Ok(self.entities.find_by_uuid(uuid).await?)
    }

    /// Stores new content. Only the embedding kinds fed by the fields that
    /// changed are invalidated, in the same transaction as the content.
    pub async fn update(
        &self,
        uuid: Uuid,
        variant: EntityVariant,
    ) -> Result<UpdatedEntity, RegistryError> {
        let update = self.entities.update(uuid, &variant).await?;

        if update.went_stale() {
            self.reconciler.content_invalidated(&update).await;
            self.schedule(ReconcileJob::Embed { entity_uuid: uuid })
                .await;
        }

        Ok(UpdatedEntity {
            entity: update.current,
            invalidated_kinds: update.invalidated_kinds,
            queued_points: update.queued_points,
        })
    }

    /// Relational delete first. External cleanup of the queued points is
    /// attempted afterwards and never undoes the delete.
    pub async fn delete(&self, uuid: Uuid) -> Result<Option<DeletedEntity>, RegistryError> {
        let Some(deletion) = self.entities.delete(uuid).await? else {
            return Ok(None);
        };

        self.reconciler.entity_deleted(&deletion).await;
        self.schedule(ReconcileJob::PurgePoints {
            entity_uuid: Some(uuid),
        })
        .await;

        Ok(Some(DeletedEntity {
            record: deletion.record,
            queued_points: deletion.queued_points,
        }))
    }

    pub async fn list_updated_since(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<EntityRecord>, RegistryError> {
        Ok(self
            .entities
            .list_kind_updated_since(kind, since, limit)
            .await?)
    }

    pub async fn embeddings_for(&self, uuid: Uuid) -> Result<Vec<EmbeddingMetadata>, RegistryError> {
        Ok(self.metadata.list_for(uuid).try_collect().await?)
    }

    pub async fn count_by_kind(&self) -> Result<Vec<(EntityKind, i64)>, RegistryError> {
        Ok(self.entities.count_by_kind().await?)
    }

    async fn schedule(&self, job: ReconcileJob) {
        if let Some(queue) = &self.queue {
            match queue.enqueue(job).await {
                Ok(()) => return,
                Err(e) => warn!(?job, error = %e, "Reconcile queue rejected job, running inline"),
            }
        }

        if let Err(e) = self.reconciler.run_job(job).await {
            warn!(?job, error = %e, "Inline reconcile failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::reconciler::ReconcilerSettings;
    use crate::application::services::retry::RetryPolicy;
    use crate::domain::entities::OutboxEventType;
    use crate::domain::entities::variants::{Education, Resume, Skill, WorkExperience};
    use crate::infrastructure::memory::{
        HashingEmbeddingProvider, InMemoryEventSink, InMemoryRegistry, InMemoryVectorIndex,
    };
    use std::time::Duration;

    struct Fixture {
        registry: Arc<InMemoryRegistry>,
        index: Arc<InMemoryVectorIndex>,
        service: EntityService,
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
        let service = EntityService::new(registry.clone(), registry.clone(), reconciler);
        Fixture {
            registry,
            index,
            service,
        }
    }

    fn skill(name: &str, proficiency: &str) -> EntityVariant {
        EntityVariant::Skill(Skill {
            profile_id: 4,
            category: Some("Languages".to_string()),
            name: Some(name.to_string()),
            proficiency: Some(proficiency.to_string()),
        })
    }

    #[tokio::test]
    async fn test_create_embeds_inline_without_queue() {
        let f = fixture();
        let entity = f.service.create(skill("Rust", "Expert")).await.unwrap();

        let rows = f.service.embeddings_for(entity.uuid()).await.unwrap();
        assert!(!rows.is_empty());
        assert_eq!(f.index.len(), rows.len());
    }

    #[tokio::test]
    async fn test_create_survives_index_outage() {
        let f = fixture();
        f.index.set_available(false);

        let entity = f.service.create(skill("Rust", "Expert")).await.unwrap();

        assert!(f.service.get(entity.uuid()).await.unwrap().is_some());
        assert!(f.service.embeddings_for(entity.uuid()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_invalidates_only_bound_kinds() {
        let f = fixture();
        let entity = f.service.create(skill("Rust", "Intermediate")).await.unwrap();

        let updated = f
            .service
            .update(entity.uuid(), skill("Rust", "Expert"))
            .await
            .unwrap();

        assert_eq!(
            updated.invalidated_kinds,
            BTreeSet::from([EmbeddingKind::FullText])
        );
        let rows = f.service.embeddings_for(entity.uuid()).await.unwrap();
        assert_eq!(f.index.len(), rows.len());
        for point in &updated.queued_points {
            assert!(!f.index.contains(*point));
        }
    }

    #[tokio::test]
    async fn test_failed_update_keeps_content_and_sync_state() {
        let f = fixture();
        let entity = f.service.create(skill("Rust", "Basic")).await.unwrap();
        let before = f.service.embeddings_for(entity.uuid()).await.unwrap();
        f.registry.fail_invalidations();

        let result = f.service.update(entity.uuid(), skill("Rust", "Expert")).await;

        assert!(matches!(result, Err(RegistryError::Storage(_))));
        let stored = f.service.get(entity.uuid()).await.unwrap().unwrap();
        assert_eq!(stored.variant, skill("Rust", "Basic"));
        assert_eq!(f.service.embeddings_for(entity.uuid()).await.unwrap(), before);
        let status = crate::domain::repositories::SyncStateRepository::get(
            f.registry.as_ref(),
            entity.uuid(),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(status.state().is_in_sync());
        assert!(
            f.registry
                .outbox_events()
                .iter()
                .all(|event| event.event_type() != OutboxEventType::PointDelete)
        );
    }

    #[tokio::test]
    async fn test_unbound_field_change_keeps_embeddings() {
        let f = fixture();
        let education = Education {
            profile_id: 2,
            institution: Some("TU Delft".to_string()),
            degree: Some("MSc".to_string()),
            gpa: Some(3.4),
            ..Default::default()
        };
        let entity = f
            .service
            .create(EntityVariant::Education(education.clone()))
            .await
            .unwrap();
        let before = f.service.embeddings_for(entity.uuid()).await.unwrap();

        let updated = f
            .service
            .update(
                entity.uuid(),
                EntityVariant::Education(Education {
                    gpa: Some(3.9),
                    ..education
                }),
            )
            .await
            .unwrap();

        assert!(updated.invalidated_kinds.is_empty());
        assert_eq!(f.service.embeddings_for(entity.uuid()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_rejects_kind_change() {
        let f = fixture();
        let entity = f.service.create(skill("Go", "Basic")).await.unwrap();

        let result = f
            .service
            .update(
                entity.uuid(),
                EntityVariant::Resume(Resume {
                    profile_id: 4,
                    ..Default::default()
                }),
            )
            .await;

        assert!(matches!(result, Err(RegistryError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_metadata_and_points() {
        let f = fixture();
        let entity = f
            .service
            .create(EntityVariant::WorkExperience(WorkExperience {
                profile_id: 1,
                job_title: Some("Engineer".to_string()),
                company: Some("Initech".to_string()),
                description: Some("Maintained the TPS report service.".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        let points: Vec<PointId> = f
            .service
            .embeddings_for(entity.uuid())
            .await
            .unwrap()
            .iter()
            .map(|row| row.point_id())
            .collect();
        assert_eq!(points.len(), 3);

        let deleted = f.service.delete(entity.uuid()).await.unwrap().unwrap();

        assert_eq!(deleted.queued_points.len(), 3);
        assert!(f.service.embeddings_for(entity.uuid()).await.unwrap().is_empty());
        for point in points {
            assert!(f.index.delete_attempted(point));
            assert!(!f.index.contains(point));
        }
        assert!(f.service.delete(entity.uuid()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_stands_when_index_is_down() {
        let f = fixture();
        let entity = f.service.create(skill("SQL", "Expert")).await.unwrap();
        f.index.set_available(false);

        let deleted = f.service.delete(entity.uuid()).await.unwrap().unwrap();

        assert!(f.service.get(entity.uuid()).await.unwrap().is_none());
        for point in &deleted.queued_points {
            assert!(f.index.delete_attempted(*point));
            assert!(f.index.contains(*point));
        }
        let failed = crate::domain::repositories::OutboxRepository::fetch_point_deletions(
            f.registry.as_ref(),
            crate::domain::repositories::DeletionFilter::Failed,
            Some(entity.uuid()),
            10,
        )
        .await
        .unwrap();
        assert_eq!(failed.len(), deleted.queued_points.len());
    }

    #[tokio::test]
    async fn test_list_updated_since_filters_by_kind() {
        let f = fixture();
        let since = Utc::now() - chrono::Duration::seconds(1);
        f.service.create(skill("Rust", "Expert")).await.unwrap();
        f.service
            .create(EntityVariant::Resume(Resume {
                profile_id: 4,
                title: Some("Backend CV".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();

        let skills = f
            .service
            .list_updated_since(EntityKind::Skill, since, 50)
            .await
            .unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].kind(), EntityKind::Skill);
    }
}
