use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use uuid::Uuid;

use crate::domain::entities::{
    DomainEntity, EmbeddingMetadata, EntityRecord, EntitySyncStatus, EntityVariant,
    NewEmbeddingMetadata, OutboxEvent, OutboxEventType,
};
use crate::domain::repositories::{
    DeletionFilter, EmbeddingMetadataRepository, EntityDeletion, EntityRepository,
    EntityRepositoryError, EntityUpdate, MetadataError, OutboxError, OutboxRepository, PointRef,
    SyncStateError, SyncStateRepository,
};
use crate::domain::value_objects::{EmbeddingKind, EntityKind, PointId, SyncState};

#[derive(Default)]
struct State {
    last_local_key: i32,
    entities: HashMap<Uuid, EntityRecord>,
    variants: HashMap<Uuid, EntityVariant>,
    metadata: Vec<EmbeddingMetadata>,
    outbox: Vec<OutboxEvent>,
    sync_states: HashMap<Uuid, EntitySyncStatus>,
    fail_invalidation: bool,
}

impl State {
    fn domain_entity(&self, uuid: Uuid) -> Result<Option<DomainEntity>, EntityRepositoryError> {
        let Some(record) = self.entities.get(&uuid) else {
            return Ok(None);
        };
        let variant = self.variants.get(&uuid).cloned().ok_or(
            EntityRepositoryError::MissingVariant {
                uuid,
                kind: record.kind(),
            },
        )?;

        DomainEntity::new(record.clone(), variant)
            .map(Some)
            .map_err(EntityRepositoryError::ValidationError)
    }

    /// Mirrors `invalidate` on the database: rows go, their points are queued.
    fn remove_metadata(&mut self, entity_uuid: Uuid, kind: Option<EmbeddingKind>) -> Vec<PointId> {
        let entity_kind = self.entities.get(&entity_uuid).map(EntityRecord::kind);
        let mut removed: Vec<EmbeddingMetadata> = Vec::new();

        self.metadata.retain(|row| {
            let matches = row.entity_uuid() == entity_uuid
                && kind.is_none_or(|kind| row.embedding_kind() == kind);
            if matches {
                removed.push(row.clone());
            }
            !matches
        });
        removed.sort_by_key(|row| (row.embedding_kind(), row.chunk_index()));

        removed
            .into_iter()
            .map(|row| {
                self.outbox.push(OutboxEvent::point_delete(
                    entity_uuid,
                    entity_kind,
                    row.point_id(),
                ));
                row.point_id()
            })
            .collect()
    }

    /// Same checks as the resume foreign key plus the job description kind.
    fn check_references(&self, variant: &EntityVariant) -> Result<(), EntityRepositoryError> {
        let EntityVariant::Resume(resume) = variant else {
            return Ok(());
        };
        let Some(target) = resume.job_description_uuid else {
            return Ok(());
        };

        match self.entities.get(&target).map(EntityRecord::kind) {
            None => Err(EntityRepositoryError::AllocationFailed(format!(
                "job_description_uuid {} does not exist",
                target
            ))),
            Some(EntityKind::JobDescription) => Ok(()),
            Some(kind) => Err(EntityRepositoryError::ValidationError(format!(
                "job_description_uuid {} refers to a {}, not a job_description",
                target, kind
            ))),
        }
    }

    fn mark_stale(&mut self, entity_uuid: Uuid) -> Option<SyncState> {
        let current = self.sync_states.get(&entity_uuid).cloned();
        let prior = current.as_ref().map(|status| status.state().clone());
        let mut status = current.unwrap_or_else(|| EntitySyncStatus::pending(entity_uuid));
        if status.transition_to(SyncState::PendingEmbed).is_ok() {
            self.sync_states.insert(entity_uuid, status);
        }
        prior
    }

    fn outbox_event_mut(&mut self, event_uuid: Uuid) -> Result<&mut OutboxEvent, OutboxError> {
        self.outbox
            .iter_mut()
            .find(|event| event.uuid() == event_uuid)
            .ok_or(OutboxError::NotFound(event_uuid))
    }
}

/// Every repository over one mutex-guarded state, with the same constraints
/// and cascades as the Postgres schema. Used by tests and local runs.
#[derive(Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every outbox row, oldest first.
    pub fn outbox_events(&self) -> Vec<OutboxEvent> {
        self.state().outbox.clone()
    }

    /// Makes every later update that invalidates embeddings fail before it
    /// writes anything, like a rolled back transaction.
    #[cfg(test)]
    pub fn fail_invalidations(&self) {
        self.state().fail_invalidation = true;
    }

    /// Rewrites a variant row without invalidating anything.
    #[cfg(test)]
    pub fn overwrite_variant(&self, uuid: Uuid, variant: EntityVariant) {
        self.state().variants.insert(uuid, variant);
    }

    /// Removes a variant row behind the entity's back.
    #[cfg(test)]
    pub fn drop_variant_row(&self, uuid: Uuid) {
        self.state().variants.remove(&uuid);
    }
}

#[async_trait]
impl EntityRepository for InMemoryRegistry {
    async fn create(&self, variant: &EntityVariant) -> Result<DomainEntity, EntityRepositoryError> {
        let mut state = self.state();
        state.check_references(variant)?;
        state.last_local_key += 1;

        let now = Utc::now();
        let record = EntityRecord::from_database(
            state.last_local_key,
            Uuid::new_v4(),
            variant.kind(),
            now,
            now,
        );
        state.entities.insert(record.uuid(), record.clone());
        state.variants.insert(record.uuid(), variant.clone());

        DomainEntity::new(record, variant.clone()).map_err(EntityRepositoryError::AllocationFailed)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<DomainEntity>, EntityRepositoryError> {
        self.state().domain_entity(uuid)
    }

    async fn exists(&self, uuid: Uuid) -> Result<bool, EntityRepositoryError> {
        Ok(self.state().entities.contains_key(&uuid))
    }

    async fn update(
        &self,
        uuid: Uuid,
        variant: &EntityVariant,
    ) -> Result<EntityUpdate, EntityRepositoryError> {
        let mut state = self.state();
        let previous = state
            .domain_entity(uuid)?
            .ok_or(EntityRepositoryError::NotFound(uuid))?;

        if previous.kind() != variant.kind() {
            return Err(EntityRepositoryError::KindMismatch {
                uuid,
                existing: previous.kind(),
                requested: variant.kind(),
            });
        }
        state.check_references(variant)?;

        let invalidated_kinds = variant.affected_kinds(&previous.variant);
        if state.fail_invalidation && !invalidated_kinds.is_empty() {
            return Err(EntityRepositoryError::DatabaseError(
                "connection reset".to_string(),
            ));
        }

        let record = &previous.record;
        let touched = EntityRecord::from_database(
            record.local_key(),
            uuid,
            record.kind(),
            record.created_at(),
            Utc::now(),
        );
        state.entities.insert(uuid, touched.clone());
        state.variants.insert(uuid, variant.clone());

        let mut queued_points = Vec::new();
        for kind in &invalidated_kinds {
            queued_points.extend(state.remove_metadata(uuid, Some(*kind)));
        }
        let prior_sync_state = if invalidated_kinds.is_empty() {
            None
        } else {
            state.mark_stale(uuid)
        };

        let current = DomainEntity::new(touched, variant.clone())
            .map_err(EntityRepositoryError::ValidationError)?;
        Ok(EntityUpdate {
            previous,
            current,
            invalidated_kinds,
            queued_points,
            prior_sync_state,
        })
    }

    async fn delete(&self, uuid: Uuid) -> Result<Option<EntityDeletion>, EntityRepositoryError> {
        let mut state = self.state();
        if !state.entities.contains_key(&uuid) {
            return Ok(None);
        }

        let queued_points = state.remove_metadata(uuid, None);
        state.variants.remove(&uuid);
        state.sync_states.remove(&uuid);
        let Some(record) = state.entities.remove(&uuid) else {
            return Ok(None);
        };

        Ok(Some(EntityDeletion {
            record,
            queued_points,
        }))
    }

    async fn list_kind_updated_since(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<EntityRecord>, EntityRepositoryError> {
        let state = self.state();
        let mut records: Vec<EntityRecord> = state
            .entities
            .values()
            .filter(|record| record.kind() == kind && record.updated_since(since))
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.updated_at(), record.local_key()));
        records.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(records)
    }

    async fn count_by_kind(&self) -> Result<Vec<(EntityKind, i64)>, EntityRepositoryError> {
        let state = self.state();
        let mut counts: BTreeMap<EntityKind, i64> = BTreeMap::new();
        for record in state.entities.values() {
            *counts.entry(record.kind()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn find_orphaned_entities(&self) -> Result<Vec<EntityRecord>, EntityRepositoryError> {
        let state = self.state();
        let mut orphans: Vec<EntityRecord> = state
            .entities
            .values()
            .filter(|record| !state.variants.contains_key(&record.uuid()))
            .cloned()
            .collect();
        orphans.sort_by_key(EntityRecord::local_key);
        Ok(orphans)
    }
}

#[async_trait]
impl EmbeddingMetadataRepository for InMemoryRegistry {
    async fn record(
        &self,
        request: NewEmbeddingMetadata,
    ) -> Result<EmbeddingMetadata, MetadataError> {
        let mut state = self.state();

        if !state.entities.contains_key(&request.entity_uuid) {
            return Err(MetadataError::EntityNotFound(request.entity_uuid));
        }
        if state.metadata.iter().any(|row| row.slot() == request.slot()) {
            return Err(MetadataError::SlotConflict(request.slot()));
        }
        if state
            .metadata
            .iter()
            .any(|row| row.point_id() == request.point_id)
        {
            return Err(MetadataError::PointConflict(request.point_id));
        }

        let row = EmbeddingMetadata::new(request);
        state.metadata.push(row.clone());
        Ok(row)
    }

    fn list_for(&self, entity_uuid: Uuid) -> BoxStream<'static, Result<EmbeddingMetadata, MetadataError>> {
        let mut rows: Vec<EmbeddingMetadata> = self
            .state()
            .metadata
            .iter()
            .filter(|row| row.entity_uuid() == entity_uuid)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.embedding_kind(), row.chunk_index()));

        stream::iter(rows.into_iter().map(Ok)).boxed()
    }

    async fn invalidate(
        &self,
        entity_uuid: Uuid,
        embedding_kind: Option<EmbeddingKind>,
    ) -> Result<Vec<PointId>, MetadataError> {
        Ok(self.state().remove_metadata(entity_uuid, embedding_kind))
    }

    async fn delete_all_for(&self, entity_uuid: Uuid) -> Result<Vec<PointId>, MetadataError> {
        Ok(self.state().remove_metadata(entity_uuid, None))
    }

    async fn find_by_point_id(
        &self,
        point_id: PointId,
    ) -> Result<Option<EmbeddingMetadata>, MetadataError> {
        Ok(self
            .state()
            .metadata
            .iter()
            .find(|row| row.point_id() == point_id)
            .cloned())
    }

    async fn list_point_ids(
        &self,
        after: Option<PointId>,
        limit: i64,
    ) -> Result<Vec<PointRef>, MetadataError> {
        let state = self.state();
        let mut points: Vec<PointRef> = state
            .metadata
            .iter()
            .filter(|row| after.is_none_or(|after| row.point_id() > after))
            .map(|row| PointRef {
                point_id: row.point_id(),
                entity_uuid: row.entity_uuid(),
                embedding_kind: row.embedding_kind(),
            })
            .collect();
        points.sort_by_key(|point| point.point_id);
        points.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(points)
    }

    async fn count(&self) -> Result<i64, MetadataError> {
        Ok(self.state().metadata.len() as i64)
    }

    async fn count_by_model(&self, model_name: &str) -> Result<i64, MetadataError> {
        Ok(self
            .state()
            .metadata
            .iter()
            .filter(|row| row.provenance().model_name.as_deref() == Some(model_name))
            .count() as i64)
    }
}

#[async_trait]
impl OutboxRepository for InMemoryRegistry {
    async fn append(&self, event: &OutboxEvent) -> Result<(), OutboxError> {
        self.state().outbox.push(event.clone());
        Ok(())
    }

    async fn fetch_point_deletions(
        &self,
        filter: DeletionFilter,
        entity_uuid: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, OutboxError> {
        let state = self.state();
        Ok(state
            .outbox
            .iter()
            .filter(|event| event.event_type() == OutboxEventType::PointDelete)
            .filter(|event| !event.is_processed())
            .filter(|event| match filter {
                DeletionFilter::Pending => event.error().is_none(),
                DeletionFilter::Failed => event.error().is_some(),
                DeletionFilter::Unprocessed => true,
            })
            .filter(|event| entity_uuid.is_none_or(|uuid| event.entity_uuid() == uuid))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, event_uuid: Uuid) -> Result<(), OutboxError> {
        self.state().outbox_event_mut(event_uuid)?.mark_processed();
        Ok(())
    }

    async fn mark_attempt_failed(&self, event_uuid: Uuid, error: &str) -> Result<(), OutboxError> {
        self.state()
            .outbox_event_mut(event_uuid)?
            .record_failure(error);
        Ok(())
    }
}

#[async_trait]
impl SyncStateRepository for InMemoryRegistry {
    async fn get(&self, entity_uuid: Uuid) -> Result<Option<EntitySyncStatus>, SyncStateError> {
        Ok(self.state().sync_states.get(&entity_uuid).cloned())
    }

    async fn put(&self, status: &EntitySyncStatus) -> Result<(), SyncStateError> {
        let mut state = self.state();
        if !state.entities.contains_key(&status.entity_uuid()) {
            return Err(SyncStateError::EntityNotFound(status.entity_uuid()));
        }
        state
            .sync_states
            .insert(status.entity_uuid(), status.clone());
        Ok(())
    }

    async fn list_by_state(
        &self,
        state_filter: &SyncState,
        limit: i64,
    ) -> Result<Vec<EntitySyncStatus>, SyncStateError> {
        let state = self.state();
        let mut statuses: Vec<EntitySyncStatus> = state
            .sync_states
            .values()
            .filter(|status| status.state().as_str() == state_filter.as_str())
            .cloned()
            .collect();
        statuses.sort_by_key(EntitySyncStatus::updated_at);
        statuses.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(statuses)
    }
}
