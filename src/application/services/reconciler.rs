use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::TryStreamExt;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::ports::embedding_provider::{
    BatchEmbeddingRequest, EmbeddingProvider, EmbeddingProviderError,
};
use crate::application::ports::event_sink::{ReconcileEventSink, SyncTransition};
use crate::application::ports::reconcile_queue::ReconcileJob;
use crate::application::ports::vector_index::{VectorIndex, VectorIndexError, VectorPoint};
use crate::application::services::chunking::{Chunker, TextChunk};
use crate::application::services::errors::RegistryError;
use crate::application::services::retry::RetryPolicy;
use crate::domain::entities::embedding_metadata::preview;
use crate::domain::entities::{
    DomainEntity, EmbeddingMetadata, EntitySyncStatus, EntityVariant, NewEmbeddingMetadata,
    OutboxEvent, Provenance,
};
use crate::domain::repositories::{
    DeletionFilter, EmbeddingMetadataRepository, EntityDeletion, EntityRepository, EntityUpdate,
    MetadataError, OutboxRepository, SyncStateError, SyncStateRepository,
};
use crate::domain::value_objects::{ContentHash, EmbeddingKind, EntityKind, PointId, SyncState};

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub retry: RetryPolicy,
    pub chunk_max_chars: usize,
    pub embed_batch_size: usize,
    pub deletion_batch_size: i64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunk_max_chars: 2000,
            embed_batch_size: 10,
            deletion_batch_size: 100,
        }
    }
}

/// A chunk that should exist in the index but has no metadata row yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChunk {
    pub embedding_kind: EmbeddingKind,
    pub chunk_index: i32,
    pub text: String,
    pub content_hash: ContentHash,
}

impl PlannedChunk {
    fn new(embedding_kind: EmbeddingKind, chunk: &TextChunk) -> Self {
        Self {
            embedding_kind,
            chunk_index: chunk.index,
            content_hash: ContentHash::of_text(&chunk.text),
            text: chunk.text.clone(),
        }
    }
}

/// Difference between an entity's current content and its recorded embeddings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingPlan {
    /// Kinds whose rows no longer describe the content and must be dropped
    /// before re-embedding.
    pub stale_kinds: BTreeSet<EmbeddingKind>,
    pub missing: Vec<PlannedChunk>,
    pub unchanged: usize,
}

impl EmbeddingPlan {
    pub fn is_in_sync(&self) -> bool {
        self.stale_kinds.is_empty() && self.missing.is_empty()
    }
}

/// Compares rendered content against the recorded rows. A kind is stale when
/// any row's hash differs from the chunk now at that index, when a row sits
/// past the last chunk, or when the variant stopped producing that kind. Rows
/// that still match are kept; only the gaps are planned.
pub fn plan_embeddings(
    variant: &EntityVariant,
    existing: &[EmbeddingMetadata],
    chunker: &Chunker,
) -> EmbeddingPlan {
    let desired: BTreeMap<EmbeddingKind, Vec<TextChunk>> = variant
        .embedding_kinds()
        .into_iter()
        .map(|kind| {
            let chunks = variant
                .render(kind)
                .map(|text| chunker.chunk(&text))
                .unwrap_or_default();
            (kind, chunks)
        })
        .collect();

    let mut recorded: BTreeMap<EmbeddingKind, Vec<&EmbeddingMetadata>> = BTreeMap::new();
    for row in existing {
        recorded.entry(row.embedding_kind()).or_default().push(row);
    }

    let mut plan = EmbeddingPlan::default();

    for kind in recorded.keys() {
        if !desired.contains_key(kind) {
            plan.stale_kinds.insert(*kind);
        }
    }

    for (kind, chunks) in &desired {
        let rows = recorded.get(kind).map(Vec::as_slice).unwrap_or(&[]);

        let stale = rows.iter().any(|row| {
            usize::try_from(row.chunk_index())
                .ok()
                .and_then(|index| chunks.get(index))
                .is_none_or(|chunk| !row.matches_text(&chunk.text))
        });
        if stale {
            plan.stale_kinds.insert(*kind);
        }

        for chunk in chunks {
            let kept = !stale && rows.iter().any(|row| row.chunk_index() == chunk.index);
            if kept {
                plan.unchanged += 1;
            } else {
                plan.missing.push(PlannedChunk::new(*kind, chunk));
            }
        }
    }

    plan
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    InSync {
        written: usize,
        unchanged: usize,
        invalidated: usize,
        conflicts: usize,
    },
    /// External failure after retries; the entity is left `Failed` for the sweep.
    Failed { reason: String },
    EntityMissing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDeletion {
    pub entity_uuid: Uuid,
    pub point_id: PointId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeletionReport {
    pub deleted: usize,
    pub failed: Vec<FailedDeletion>,
}

impl DeletionReport {
    pub fn merge(&mut self, other: DeletionReport) {
        self.deleted += other.deleted;
        self.failed.extend(other.failed);
    }
}

#[derive(Debug, Default)]
struct EmbedProgress {
    written: usize,
    conflicts: usize,
}

enum EmbedFailure {
    EntityVanished,
    External(String),
    Registry(RegistryError),
}

impl From<RegistryError> for EmbedFailure {
    fn from(error: RegistryError) -> Self {
        EmbedFailure::Registry(error)
    }
}

/// Keeps embedding metadata and the external vector index consistent.
///
/// Relational writes always happen in their own short transactions and no
/// network call is made while one is open. External failures are retried
/// under the configured policy and then reported as state, never as errors.
pub struct Reconciler {
    entities: Arc<dyn EntityRepository>,
    metadata: Arc<dyn EmbeddingMetadataRepository>,
    sync_states: Arc<dyn SyncStateRepository>,
    outbox: Arc<dyn OutboxRepository>,
    vector_index: Arc<dyn VectorIndex>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    event_sink: Arc<dyn ReconcileEventSink>,
    chunker: Chunker,
    settings: ReconcilerSettings,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        metadata: Arc<dyn EmbeddingMetadataRepository>,
        sync_states: Arc<dyn SyncStateRepository>,
        outbox: Arc<dyn OutboxRepository>,
        vector_index: Arc<dyn VectorIndex>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        event_sink: Arc<dyn ReconcileEventSink>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            entities,
            metadata,
            sync_states,
            outbox,
            vector_index,
            embedding_provider,
            event_sink,
            chunker: Chunker::new(settings.chunk_max_chars),
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    pub async fn sync_status(
        &self,
        entity_uuid: Uuid,
    ) -> Result<Option<EntitySyncStatus>, RegistryError> {
        Ok(self.sync_states.get(entity_uuid).await?)
    }

    pub async fn mark_pending(
        &self,
        entity_uuid: Uuid,
        kind: Option<EntityKind>,
    ) -> Result<(), RegistryError> {
        self.transition(entity_uuid, kind, SyncState::PendingEmbed)
            .await
    }

    /// Announces a committed update that invalidated embeddings. The stale rows
    /// and the move to `PendingEmbed` were part of the update's transaction.
    pub async fn content_invalidated(&self, update: &EntityUpdate) {
        let entity_uuid = update.current.uuid();
        info!(
            %entity_uuid,
            kinds = ?update.invalidated_kinds,
            points = update.queued_points.len(),
            "Content change invalidated embeddings"
        );

        if update.prior_sync_state.as_ref() != Some(&SyncState::PendingEmbed) {
            self.event_sink
                .publish(
                    &SyncTransition::new(
                        entity_uuid,
                        update.prior_sync_state.clone(),
                        SyncState::PendingEmbed,
                    )
                    .with_kind(Some(update.current.kind())),
                )
                .await;
        }
    }

    /// Announces a committed relational delete. Its points are already queued.
    pub async fn entity_deleted(&self, deletion: &EntityDeletion) {
        let record = &deletion.record;
        info!(
            entity_uuid = %record.uuid(),
            kind = %record.kind(),
            points = deletion.queued_points.len(),
            "Entity deleted, external points queued"
        );

        self.event_sink
            .publish(
                &SyncTransition::new(record.uuid(), None, SyncState::PendingDelete)
                    .with_kind(Some(record.kind())),
            )
            .await;
    }

    pub async fn plan_for(&self, entity: &DomainEntity) -> Result<EmbeddingPlan, RegistryError> {
        let existing: Vec<EmbeddingMetadata> =
            self.metadata.list_for(entity.uuid()).try_collect().await?;
        Ok(plan_embeddings(&entity.variant, &existing, &self.chunker))
    }

    pub async fn run_job(&self, job: ReconcileJob) -> Result<(), RegistryError> {
        match job {
            ReconcileJob::Embed { entity_uuid } => {
                self.reconcile_entity(entity_uuid).await?;
            }
            ReconcileJob::PurgePoints { entity_uuid } => {
                self.process_point_deletions(DeletionFilter::Pending, entity_uuid)
                    .await?;
            }
            ReconcileJob::Sweep => {
                warn!("Sweep jobs are handled by the sweep runner, ignoring");
            }
        }
        Ok(())
    }

    /// Brings one entity's recorded embeddings in line with its content.
    pub async fn reconcile_entity(
        &self,
        entity_uuid: Uuid,
    ) -> Result<ReconcileOutcome, RegistryError> {
        let Some(entity) = self.entities.find_by_uuid(entity_uuid).await? else {
            debug!(%entity_uuid, "Entity gone before reconcile");
            self.process_point_deletions(DeletionFilter::Pending, Some(entity_uuid))
                .await?;
            return Ok(ReconcileOutcome::EntityMissing);
        };
        let kind = Some(entity.kind());

        self.transition(entity_uuid, kind, SyncState::PendingEmbed)
            .await?;

        let plan = self.plan_for(&entity).await?;
        let mut invalidated = 0;
        for stale_kind in &plan.stale_kinds {
            invalidated += self
                .metadata
                .invalidate(entity_uuid, Some(*stale_kind))
                .await?
                .len();
        }

        let progress = match self.embed_chunks(&entity, &plan.missing).await {
            Ok(progress) => progress,
            Err(EmbedFailure::EntityVanished) => {
                info!(%entity_uuid, "Entity deleted while embedding, discarded new points");
                self.process_point_deletions(DeletionFilter::Pending, Some(entity_uuid))
                    .await?;
                return Ok(ReconcileOutcome::EntityMissing);
            }
            Err(EmbedFailure::External(reason)) => {
                error!(%entity_uuid, %reason, "Reconcile failed");
                self.process_point_deletions(DeletionFilter::Pending, Some(entity_uuid))
                    .await?;
                self.transition(entity_uuid, kind, SyncState::Failed(reason.clone()))
                    .await?;
                return Ok(ReconcileOutcome::Failed { reason });
            }
            Err(EmbedFailure::Registry(e)) => return Err(e),
        };

        self.process_point_deletions(DeletionFilter::Pending, Some(entity_uuid))
            .await?;
        self.transition(entity_uuid, kind, SyncState::InSync).await?;

        info!(
            %entity_uuid,
            written = progress.written,
            unchanged = plan.unchanged,
            invalidated,
            conflicts = progress.conflicts,
            "Entity in sync"
        );

        Ok(ReconcileOutcome::InSync {
            written: progress.written,
            unchanged: plan.unchanged,
            invalidated,
            conflicts: progress.conflicts,
        })
    }

    /// Deletes queued points from the index. One batch per call; failures are
    /// recorded on the outbox event and reported, the relational state stays.
    pub async fn process_point_deletions(
        &self,
        filter: DeletionFilter,
        entity_uuid: Option<Uuid>,
    ) -> Result<DeletionReport, RegistryError> {
        let events = self
            .outbox
            .fetch_point_deletions(filter, entity_uuid, self.settings.deletion_batch_size)
            .await?;

        let mut report = DeletionReport::default();

        for event in events {
            let Some(point_id) = event.point_id() else {
                warn!(event_uuid = %event.uuid(), "Point deletion without a point id, dropping");
                self.outbox.mark_processed(event.uuid()).await?;
                continue;
            };

            let result = self
                .settings
                .retry
                .run("vector_delete", VectorIndexError::is_retryable, || {
                    self.vector_index.delete(point_id)
                })
                .await;

            match result {
                Ok(()) => {
                    self.outbox.mark_processed(event.uuid()).await?;
                    report.deleted += 1;
                }
                Err(exhausted) => {
                    let reason = exhausted.to_string();
                    error!(
                        entity_uuid = %event.entity_uuid(),
                        %point_id,
                        %reason,
                        "External point deletion failed, left for cleanup"
                    );
                    self.outbox
                        .mark_attempt_failed(event.uuid(), &reason)
                        .await?;
                    self.event_sink
                        .publish(
                            &SyncTransition::new(
                                event.entity_uuid(),
                                Some(SyncState::PendingDelete),
                                SyncState::Failed(reason.clone()),
                            )
                            .with_kind(event.entity_kind())
                            .with_point(point_id),
                        )
                        .await;
                    report.failed.push(FailedDeletion {
                        entity_uuid: event.entity_uuid(),
                        point_id,
                        reason,
                    });
                }
            }
        }

        if report.deleted > 0 || !report.failed.is_empty() {
            debug!(
                deleted = report.deleted,
                failed = report.failed.len(),
                "Processed point deletions"
            );
        }

        Ok(report)
    }

    pub async fn process_pending_deletions(&self) -> Result<DeletionReport, RegistryError> {
        self.process_point_deletions(DeletionFilter::Pending, None)
            .await
    }

    pub async fn retry_failed_deletions(&self) -> Result<DeletionReport, RegistryError> {
        self.process_point_deletions(DeletionFilter::Failed, None)
            .await
    }

    async fn embed_chunks(
        &self,
        entity: &DomainEntity,
        chunks: &[PlannedChunk],
    ) -> Result<EmbedProgress, EmbedFailure> {
        let mut progress = EmbedProgress::default();
        if chunks.is_empty() {
            return Ok(progress);
        }

        let (model_name, model_version) = self.embedding_provider.model_info();

        for batch in chunks.chunks(self.settings.embed_batch_size.max(1)) {
            let request = BatchEmbeddingRequest {
                texts: batch.iter().map(|chunk| chunk.text.clone()).collect(),
                model_name: Some(model_name.clone()),
                model_version: model_version.clone(),
            };

            let response = self
                .settings
                .retry
                .run(
                    "generate_embeddings",
                    EmbeddingProviderError::is_retryable,
                    || self.embedding_provider.generate_embeddings(request.clone()),
                )
                .await
                .map_err(|e| EmbedFailure::External(e.to_string()))?;

            if response.embeddings.len() != batch.len() {
                return Err(EmbedFailure::External(format!(
                    "embedding service returned {} vectors for {} texts",
                    response.embeddings.len(),
                    batch.len()
                )));
            }

            for (chunk, vector) in batch.iter().zip(response.embeddings) {
                self.write_chunk(
                    entity,
                    chunk,
                    vector,
                    &response.model_name,
                    response.model_version.clone(),
                    &mut progress,
                )
                .await?;
            }
        }

        Ok(progress)
    }

    /// Upserts one point, then records it. The point goes first so a recorded
    /// row always refers to something that was written.
    async fn write_chunk(
        &self,
        entity: &DomainEntity,
        chunk: &PlannedChunk,
        vector: Vec<f32>,
        model_name: &str,
        model_version: Option<String>,
        progress: &mut EmbedProgress,
    ) -> Result<(), EmbedFailure> {
        let point_id = PointId::new();
        let point = VectorPoint {
            id: point_id,
            vector,
            payload: json!({
                "entity_uuid": entity.uuid(),
                "entity_kind": entity.kind().as_str(),
                "embedding_kind": chunk.embedding_kind.as_str(),
                "chunk_index": chunk.chunk_index,
                "content_hash": chunk.content_hash.as_str(),
            }),
        };

        self.settings
            .retry
            .run("vector_upsert", VectorIndexError::is_retryable, || {
                self.vector_index.upsert(point.clone())
            })
            .await
            .map_err(|e| EmbedFailure::External(e.to_string()))?;

        let provenance = Provenance {
            text_preview: Some(preview(&chunk.text)),
            token_count: i32::try_from(chunk.text.split_whitespace().count()).ok(),
            model_name: Some(model_name.to_string()),
            model_version,
            content_hash: Some(chunk.content_hash.clone()),
            extra: Some(json!({ "chars": chunk.text.chars().count() })),
        };
        let request = NewEmbeddingMetadata::new(
            entity.uuid(),
            point_id,
            chunk.embedding_kind,
            chunk.chunk_index,
            provenance,
        )
        .map_err(|e| EmbedFailure::Registry(RegistryError::InvalidRequest(e)))?;

        match self.metadata.record(request).await {
            Ok(_) => {
                progress.written += 1;
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                warn!(
                    entity_uuid = %entity.uuid(),
                    embedding_kind = %chunk.embedding_kind,
                    chunk_index = chunk.chunk_index,
                    %point_id,
                    "Slot already recorded by a concurrent attempt, discarding own point"
                );
                self.discard_point(entity, point_id).await?;
                progress.conflicts += 1;
                Ok(())
            }
            Err(MetadataError::EntityNotFound(_)) => {
                self.discard_point(entity, point_id).await?;
                Err(EmbedFailure::EntityVanished)
            }
            Err(e) => {
                self.discard_point(entity, point_id).await?;
                Err(EmbedFailure::Registry(e.into()))
            }
        }
    }

    /// Removes a point this attempt wrote but could not record. If the index
    /// refuses, the point is queued so it is never left untracked.
    async fn discard_point(
        &self,
        entity: &DomainEntity,
        point_id: PointId,
    ) -> Result<(), RegistryError> {
        let result = self
            .settings
            .retry
            .run("vector_delete", VectorIndexError::is_retryable, || {
                self.vector_index.delete(point_id)
            })
            .await;

        if let Err(exhausted) = result {
            warn!(%point_id, error = %exhausted, "Could not discard point, queueing deletion");
            self.outbox
                .append(&OutboxEvent::point_delete(
                    entity.uuid(),
                    Some(entity.kind()),
                    point_id,
                ))
                .await?;
        }

        Ok(())
    }

    async fn transition(
        &self,
        entity_uuid: Uuid,
        kind: Option<EntityKind>,
        next: SyncState,
    ) -> Result<(), RegistryError> {
        let current = self.sync_states.get(entity_uuid).await?;
        let from = current.as_ref().map(|status| status.state().clone());
        let mut status = current.unwrap_or_else(|| EntitySyncStatus::pending(entity_uuid));

        if let Err(reason) = status.transition_to(next) {
            debug!(%entity_uuid, %reason, "Skipping sync state transition");
            return Ok(());
        }

        match self.sync_states.put(&status).await {
            Ok(()) => {}
            Err(SyncStateError::EntityNotFound(_)) => {
                debug!(%entity_uuid, "Entity gone, sync state not stored");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        if from.as_ref() != Some(status.state()) {
            self.event_sink
                .publish(
                    &SyncTransition::new(entity_uuid, from, status.state().clone())
                        .with_kind(kind),
                )
                .await;
        }

        Ok(())
    }
}
