use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::ports::vector_index::{VectorIndex, VectorIndexError};
use crate::application::services::errors::RegistryError;
use crate::application::services::reconciler::{DeletionReport, ReconcileOutcome, Reconciler};
use crate::domain::repositories::{
    DeletionFilter, EmbeddingMetadataRepository, EntityRepository, PointRef, SyncStateRepository,
};
use crate::domain::value_objects::{EmbeddingKind, EntityKind, PointId, SyncState};

/// An inconsistency between the two stores, or inside the relational one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "orphan", rename_all = "snake_case")]
pub enum Orphan {
    MetadataWithoutPoint {
        entity_uuid: Uuid,
        embedding_kind: EmbeddingKind,
        point_id: PointId,
    },
    PointWithoutMetadata { point_id: PointId },
    EntityWithoutVariant { entity_uuid: Uuid, kind: EntityKind },
    StaleContent {
        entity_uuid: Uuid,
        embedding_kind: EmbeddingKind,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// False when the index client cannot enumerate its points; the
    /// cross-store checks were skipped.
    pub inventory_checked: bool,
    pub orphans: Vec<Orphan>,
    pub points_deleted: usize,
    pub metadata_invalidated: usize,
    pub entities_reconciled: usize,
    pub entities_failed: usize,
    pub deletions: DeletionReport,
}

#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub page_size: usize,
    /// `PendingEmbed` rows older than this are assumed abandoned and retried.
    pub pending_grace: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            page_size: 256,
            pending_grace: Duration::from_secs(300),
        }
    }
}

/// Periodic repair of everything the Reconciler could not finish.
pub struct ReconciliationSweep {
    entities: Arc<dyn EntityRepository>,
    metadata: Arc<dyn EmbeddingMetadataRepository>,
    sync_states: Arc<dyn SyncStateRepository>,
    vector_index: Arc<dyn VectorIndex>,
    reconciler: Arc<Reconciler>,
    settings: SweepSettings,
}

impl ReconciliationSweep {
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        metadata: Arc<dyn EmbeddingMetadataRepository>,
        sync_states: Arc<dyn SyncStateRepository>,
        vector_index: Arc<dyn VectorIndex>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            entities,
            metadata,
            sync_states,
            vector_index,
            reconciler,
            settings: SweepSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SweepSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn run(&self) -> Result<SweepReport, RegistryError> {
        let started_at = Utc::now();
        let mut orphans = Vec::new();
        let mut to_reconcile: BTreeSet<Uuid> = BTreeSet::new();
        let mut metadata_invalidated = 0;
        let mut points_deleted = 0;

        let mut corrupt: BTreeSet<Uuid> = BTreeSet::new();
        for record in self.entities.find_orphaned_entities().await? {
            corrupt.insert(record.uuid());
            error!(
                entity_uuid = %record.uuid(),
                kind = %record.kind(),
                "Entity row has no variant row"
            );
            orphans.push(Orphan::EntityWithoutVariant {
                entity_uuid: record.uuid(),
                kind: record.kind(),
            });
        }

        // Metadata is listed before the index is scrolled: a point is always
        // upserted before its row is recorded, so every row seen here already
        // has its point unless something removed it.
        let recorded = self.recorded_points().await?;

        let inventory_checked = match self.indexed_points().await {
            Ok(Some(indexed)) => {
                let mut missing: BTreeMap<(Uuid, EmbeddingKind), PointId> = BTreeMap::new();
                for point in &recorded {
                    if !indexed.contains(&point.point_id) {
                        missing
                            .entry((point.entity_uuid, point.embedding_kind))
                            .or_insert(point.point_id);
                    }
                }

                for ((entity_uuid, embedding_kind), point_id) in missing {
                    warn!(%entity_uuid, %embedding_kind, %point_id, "Recorded point missing from index");
                    orphans.push(Orphan::MetadataWithoutPoint {
                        entity_uuid,
                        embedding_kind,
                        point_id,
                    });
                    metadata_invalidated += self
                        .metadata
                        .invalidate(entity_uuid, Some(embedding_kind))
                        .await?
                        .len();
                    to_reconcile.insert(entity_uuid);
                }

                let recorded_ids: HashSet<PointId> =
                    recorded.iter().map(|point| point.point_id).collect();
                for point_id in indexed.difference(&recorded_ids) {
                    // A concurrent embed may have recorded it since the listing.
                    if self.metadata.find_by_point_id(*point_id).await?.is_some() {
                        continue;
                    }

                    warn!(%point_id, "Index point has no metadata, deleting");
                    orphans.push(Orphan::PointWithoutMetadata {
                        point_id: *point_id,
                    });
                    match self.delete_point(*point_id).await {
                        Ok(()) => points_deleted += 1,
                        Err(e) => warn!(%point_id, error = %e, "Could not delete orphan point"),
                    }
                }
                true
            }
            Ok(None) => {
                info!("Vector index cannot enumerate points, skipping cross-store checks");
                false
            }
            Err(e) => {
                warn!(error = %e, "Vector index scroll failed, skipping cross-store checks");
                false
            }
        };

        let recorded_entities: BTreeSet<Uuid> =
            recorded.iter().map(|point| point.entity_uuid).collect();
        for entity_uuid in recorded_entities {
            if to_reconcile.contains(&entity_uuid) || corrupt.contains(&entity_uuid) {
                continue;
            }
            let Some(entity) = self.entities.find_by_uuid(entity_uuid).await? else {
                continue;
            };
            let plan = self.reconciler.plan_for(&entity).await?;
            if plan.stale_kinds.is_empty() {
                continue;
            }
            for embedding_kind in &plan.stale_kinds {
                warn!(%entity_uuid, %embedding_kind, "Embedding content is stale");
                orphans.push(Orphan::StaleContent {
                    entity_uuid,
                    embedding_kind: *embedding_kind,
                });
            }
            to_reconcile.insert(entity_uuid);
        }

        let limit = self.settings.page_size as i64;
        for status in self
            .sync_states
            .list_by_state(&SyncState::Failed(String::new()), limit)
            .await?
        {
            to_reconcile.insert(status.entity_uuid());
        }

        let grace = chrono::Duration::from_std(self.settings.pending_grace)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        for status in self
            .sync_states
            .list_by_state(&SyncState::PendingEmbed, limit)
            .await?
        {
            if status.updated_at() < started_at - grace {
                to_reconcile.insert(status.entity_uuid());
            }
        }

        let mut entities_reconciled = 0;
        let mut entities_failed = 0;
        for entity_uuid in to_reconcile.difference(&corrupt) {
            match self.reconciler.reconcile_entity(*entity_uuid).await {
                Ok(ReconcileOutcome::InSync { .. }) => entities_reconciled += 1,
                Ok(ReconcileOutcome::Failed { .. }) => entities_failed += 1,
                Ok(ReconcileOutcome::EntityMissing) => {}
                Err(e) => {
                    error!(%entity_uuid, error = %e, "Sweep could not reconcile entity");
                    entities_failed += 1;
                }
            }
        }

        let mut deletions = self
            .reconciler
            .process_point_deletions(DeletionFilter::Pending, None)
            .await?;
        deletions.merge(self.reconciler.retry_failed_deletions().await?);

        let report = SweepReport {
            started_at,
            finished_at: Utc::now(),
            inventory_checked,
            orphans,
            points_deleted,
            metadata_invalidated,
            entities_reconciled,
            entities_failed,
            deletions,
        };

        info!(
            orphans = report.orphans.len(),
            points_deleted = report.points_deleted,
            reconciled = report.entities_reconciled,
            failed = report.entities_failed,
            deletions_failed = report.deletions.failed.len(),
            "Reconciliation sweep finished"
        );

        Ok(report)
    }

    async fn recorded_points(&self) -> Result<Vec<PointRef>, RegistryError> {
        let mut points = Vec::new();
        let mut after = None;
        let page_size = self.settings.page_size.max(1);

        loop {
            let page = self
                .metadata
                .list_point_ids(after, page_size as i64)
                .await?;
            let done = page.len() < page_size;
            after = page.last().map(|point| point.point_id);
            points.extend(page);
            if done {
                break;
            }
        }

        Ok(points)
    }

    async fn indexed_points(&self) -> Result<Option<HashSet<PointId>>, VectorIndexError> {
        let Some(inventory) = self.vector_index.inventory() else {
            return Ok(None);
        };

        let mut points = HashSet::new();
        let mut offset = None;
        loop {
            let page = inventory
                .scroll_point_ids(offset, self.settings.page_size.max(1))
                .await?;
            points.extend(page.point_ids);
            match page.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(Some(points))
    }

    async fn delete_point(&self, point_id: PointId) -> Result<(), RegistryError> {
        self.reconciler
            .settings()
            .retry
            .run("vector_delete", VectorIndexError::is_retryable, || {
                self.vector_index.delete(point_id)
            })
            .await
            .map_err(|e| RegistryError::ExternalIndexUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::vector_index::VectorPoint;
    use crate::application::services::reconciler::ReconcilerSettings;
    use crate::application::services::retry::RetryPolicy;
    use crate::domain::entities::variants::ProfessionalSummary;
    use crate::domain::entities::EntityVariant;
    use crate::infrastructure::memory::{
        HashingEmbeddingProvider, InMemoryEventSink, InMemoryRegistry, InMemoryVectorIndex,
    };
    use futures::TryStreamExt;
    use serde_json::json;

    struct Fixture {
        registry: Arc<InMemoryRegistry>,
        index: Arc<InMemoryVectorIndex>,
        reconciler: Arc<Reconciler>,
        sweep: ReconciliationSweep,
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
        let sweep = ReconciliationSweep::new(
            registry.clone(),
            registry.clone(),
            registry.clone(),
            index.clone(),
            reconciler.clone(),
        )
        .with_settings(SweepSettings {
            page_size: 2,
            pending_grace: Duration::from_secs(300),
        });
        Fixture {
            registry,
            index,
            reconciler,
            sweep,
        }
    }

    fn summary(text: &str) -> EntityVariant {
        EntityVariant::ProfessionalSummary(ProfessionalSummary {
            profile_id: 9,
            summary_text: Some(text.to_string()),
        })
    }

    async fn embedded(f: &Fixture, text: &str) -> Uuid {
        let entity = f.registry.create(&summary(text)).await.unwrap();
        f.reconciler.reconcile_entity(entity.uuid()).await.unwrap();
        entity.uuid()
    }

    #[tokio::test]
    async fn test_clean_state_reports_nothing() {
        let f = fixture();
        embedded(&f, "Backend engineer with ten years of experience.").await;

        let report = f.sweep.run().await.unwrap();

        assert!(report.inventory_checked);
        assert!(report.orphans.is_empty());
        assert_eq!(report.points_deleted, 0);
    }

    #[tokio::test]
    async fn test_point_without_metadata_is_deleted() {
        let f = fixture();
        embedded(&f, "Data engineer.").await;
        let stray = PointId::new();
        f.index
            .upsert(VectorPoint {
                id: stray,
                vector: vec![1.0; 8],
                payload: json!({}),
            })
            .await
            .unwrap();

        let report = f.sweep.run().await.unwrap();

        assert_eq!(
            report.orphans,
            vec![Orphan::PointWithoutMetadata { point_id: stray }]
        );
        assert_eq!(report.points_deleted, 1);
        assert!(!f.index.contains(stray));
    }

    #[tokio::test]
    async fn test_metadata_without_point_is_reembedded() {
        let f = fixture();
        let entity_uuid = embedded(&f, "Site reliability engineer.").await;
        let rows: Vec<_> = f
            .registry
            .list_for(entity_uuid)
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        let lost = rows[0].point_id();
        f.index.remove_silently(lost);

        let report = f.sweep.run().await.unwrap();

        assert!(report.orphans.iter().any(|orphan| matches!(
            orphan,
            Orphan::MetadataWithoutPoint { point_id, .. } if *point_id == lost
        )));
        assert_eq!(report.entities_reconciled, 1);
        let rows: Vec<_> = f
            .registry
            .list_for(entity_uuid)
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert!(rows.iter().all(|row| f.index.contains(row.point_id())));
        assert!(rows.iter().all(|row| row.point_id() != lost));
    }

    #[tokio::test]
    async fn test_missed_invalidation_is_caught_by_hash() {
        let f = fixture();
        let entity_uuid = embedded(&f, "Frontend engineer.").await;
        f.registry
            .overwrite_variant(entity_uuid, summary("Full-stack engineer."));

        let report = f.sweep.run().await.unwrap();

        assert!(report.orphans.iter().any(|orphan| matches!(
            orphan,
            Orphan::StaleContent { entity_uuid: uuid, .. } if *uuid == entity_uuid
        )));
        let entity = f.registry.find_by_uuid(entity_uuid).await.unwrap().unwrap();
        assert!(f.reconciler.plan_for(&entity).await.unwrap().is_in_sync());
    }

    #[tokio::test]
    async fn test_failed_entities_are_retried() {
        let f = fixture();
        f.index.set_available(false);
        let entity_uuid = embedded(&f, "Platform engineer.").await;
        let status = f.reconciler.sync_status(entity_uuid).await.unwrap().unwrap();
        assert!(status.state().is_failed());

        f.index.set_available(true);
        let report = f.sweep.run().await.unwrap();

        assert_eq!(report.entities_reconciled, 1);
        let status = f.reconciler.sync_status(entity_uuid).await.unwrap().unwrap();
        assert!(status.state().is_in_sync());
    }

    #[tokio::test]
    async fn test_entity_without_variant_is_reported() {
        let f = fixture();
        let entity_uuid = embedded(&f, "Security engineer.").await;
        f.registry.drop_variant_row(entity_uuid);

        let report = f.sweep.run().await.unwrap();

        assert!(report.orphans.contains(&Orphan::EntityWithoutVariant {
            entity_uuid,
            kind: EntityKind::ProfessionalSummary,
        }));
    }

    #[tokio::test]
    async fn test_index_without_inventory_skips_cross_store_checks() {
        let f = fixture();
        embedded(&f, "Mobile engineer.").await;
        f.index.set_inventory_enabled(false);

        let report = f.sweep.run().await.unwrap();

        assert!(!report.inventory_checked);
    }
}
