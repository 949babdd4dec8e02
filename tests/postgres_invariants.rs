//! Relational invariants checked against a real Postgres.
//!
//! Set `TEST_DATABASE_URL` to run these. Every test works inside a
//! transaction that is rolled back when its pool is dropped.

use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::NaiveDate;
use diesel::{Connection, PgConnection, QueryDsl, RunQueryDsl};
use futures::TryStreamExt;
use uuid::Uuid;

use resume_registry::domain::entities::variants::{Resume, Skill, WorkExperience};
use resume_registry::domain::entities::{
    EmbeddingMetadata, EntitySyncStatus, EntityVariant, NewEmbeddingMetadata, Provenance,
};
use resume_registry::domain::repositories::{
    DeletionFilter, EmbeddingMetadataRepository, EntityRepository, EntityRepositoryError,
    MetadataError, OutboxRepository, SyncStateError, SyncStateRepository,
};
use resume_registry::domain::value_objects::{EmbeddingKind, EntityKind, PointId, SyncState};
use resume_registry::infrastructure::database::models::NewEntityModel;
use resume_registry::infrastructure::database::schema::entities;
use resume_registry::infrastructure::database::{
    DbPool, PostgresEmbeddingMetadataRepository, PostgresEntityRepository,
    PostgresOutboxRepository, PostgresSyncStateRepository, create_test_pool,
    get_connection_from_pool, run_migrations,
};

static MIGRATED: Mutex<bool> = Mutex::new(false);

struct Repos {
    pool: DbPool,
    entities: PostgresEntityRepository,
    metadata: PostgresEmbeddingMetadataRepository,
    outbox: PostgresOutboxRepository,
    sync_states: PostgresSyncStateRepository,
}

fn repos() -> Option<Repos> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };

    {
        let mut migrated = MIGRATED.lock().unwrap_or_else(|e| e.into_inner());
        if !*migrated {
            let mut conn = PgConnection::establish(&url).unwrap();
            run_migrations(&mut conn).unwrap();
            *migrated = true;
        }
    }

    let pool = create_test_pool(&url).unwrap();
    Some(Repos {
        entities: PostgresEntityRepository::new(pool.clone()),
        metadata: PostgresEmbeddingMetadataRepository::new(pool.clone()).with_page_size(2),
        outbox: PostgresOutboxRepository::new(pool.clone()),
        sync_states: PostgresSyncStateRepository::new(pool.clone()),
        pool,
    })
}

fn work_experience() -> EntityVariant {
    EntityVariant::WorkExperience(WorkExperience {
        profile_id: 1,
        job_title: Some("Platform Engineer".to_string()),
        company: Some("Acme".to_string()),
        start_date: NaiveDate::from_ymd_opt(2021, 3, 1),
        end_date: None,
        description: Some("Ran the ingestion pipeline".to_string()),
    })
}

fn skill() -> EntityVariant {
    EntityVariant::Skill(Skill {
        profile_id: 1,
        category: Some("Languages".to_string()),
        name: Some("Rust".to_string()),
        proficiency: None,
    })
}

fn row(entity_uuid: Uuid, point_id: PointId, kind: EmbeddingKind, chunk: i32) -> NewEmbeddingMetadata {
    NewEmbeddingMetadata::new(
        entity_uuid,
        point_id,
        kind,
        chunk,
        Provenance::for_text("chunk text", Some(2), "test-model", Some("1".to_string())),
    )
    .unwrap()
}

async fn listed(repos: &Repos, entity_uuid: Uuid) -> Vec<EmbeddingMetadata> {
    repos.metadata.list_for(entity_uuid).try_collect().await.unwrap()
}

#[tokio::test]
async fn test_create_writes_exactly_one_variant() {
    let Some(repos) = repos() else { return };

    let created = repos.entities.create(&work_experience()).await.unwrap();
    assert_eq!(created.kind(), EntityKind::WorkExperience);

    let loaded = repos
        .entities
        .find_by_uuid(created.uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.variant, work_experience());
    assert!(
        repos
            .entities
            .find_orphaned_entities()
            .await
            .unwrap()
            .iter()
            .all(|r| r.uuid() != created.uuid())
    );
}

#[tokio::test]
async fn test_entity_without_variant_is_reported_as_orphan() {
    let Some(repos) = repos() else { return };

    let allocated = NewEntityModel::allocate(EntityKind::Education);
    let orphan_uuid = allocated.uuid;
    {
        let mut conn = get_connection_from_pool(&repos.pool).unwrap();
        diesel::insert_into(entities::table)
            .values(&allocated)
            .execute(&mut conn)
            .unwrap();
    }

    let orphans = repos.entities.find_orphaned_entities().await.unwrap();
    assert!(orphans.iter().any(|r| r.uuid() == orphan_uuid));

    let err = repos.entities.find_by_uuid(orphan_uuid).await.unwrap_err();
    assert!(matches!(err, EntityRepositoryError::MissingVariant { .. }));
}

#[tokio::test]
async fn test_update_cannot_change_kind() {
    let Some(repos) = repos() else { return };
    let created = repos.entities.create(&work_experience()).await.unwrap();

    let err = repos
        .entities
        .update(created.uuid(), &skill())
        .await
        .unwrap_err();
    assert!(matches!(err, EntityRepositoryError::KindMismatch { .. }));

    let err = repos
        .entities
        .update(Uuid::new_v4(), &skill())
        .await
        .unwrap_err();
    assert!(matches!(err, EntityRepositoryError::NotFound(_)));
}

fn in_sync(u: Uuid) -> EntitySyncStatus {
    let mut status = EntitySyncStatus::pending(u);
    status.transition_to(SyncState::InSync).unwrap();
    status
}

fn expert_skill() -> EntityVariant {
    EntityVariant::Skill(Skill {
        profile_id: 1,
        category: Some("Languages".to_string()),
        name: Some("Rust".to_string()),
        proficiency: Some("Expert".to_string()),
    })
}

fn resume_for(job_description_uuid: Uuid) -> EntityVariant {
    EntityVariant::Resume(Resume {
        profile_id: 1,
        job_description_uuid: Some(job_description_uuid),
        title: Some("Platform CV".to_string()),
        ..Default::default()
    })
}

fn entity_count(repos: &Repos) -> i64 {
    let mut conn = get_connection_from_pool(&repos.pool).unwrap();
    entities::table.count().get_result(&mut conn).unwrap()
}

#[tokio::test]
async fn test_update_invalidates_stale_kinds_in_same_transaction() {
    let Some(repos) = repos() else { return };
    let u = repos.entities.create(&skill()).await.unwrap().uuid();
    let (full_text, keywords) = (PointId::new(), PointId::new());
    repos
        .metadata
        .record(row(u, full_text, EmbeddingKind::FullText, 0))
        .await
        .unwrap();
    repos
        .metadata
        .record(row(u, keywords, EmbeddingKind::Keywords, 0))
        .await
        .unwrap();
    repos.sync_states.put(&in_sync(u)).await.unwrap();

    let update = repos.entities.update(u, &expert_skill()).await.unwrap();

    assert_eq!(update.invalidated_kinds, BTreeSet::from([EmbeddingKind::FullText]));
    assert_eq!(update.queued_points, vec![full_text]);
    assert_eq!(update.prior_sync_state, Some(SyncState::InSync));

    let remaining: Vec<PointId> = listed(&repos, u).await.iter().map(|m| m.point_id()).collect();
    assert_eq!(remaining, vec![keywords]);
    let status = repos.sync_states.get(u).await.unwrap().unwrap();
    assert_eq!(status.state(), &SyncState::PendingEmbed);
    let queued = repos
        .outbox
        .fetch_point_deletions(DeletionFilter::Pending, Some(u), 10)
        .await
        .unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].point_id(), Some(full_text));
}

#[tokio::test]
async fn test_update_rolls_back_when_invalidation_fails() {
    let Some(repos) = repos() else { return };
    {
        let mut conn = get_connection_from_pool(&repos.pool).unwrap();
        diesel::sql_query(
            "CREATE FUNCTION reject_embedding_delete() RETURNS trigger LANGUAGE plpgsql \
             AS $$ BEGIN RAISE EXCEPTION 'connection reset'; END $$",
        )
        .execute(&mut conn)
        .unwrap();
        diesel::sql_query(
            "CREATE TRIGGER reject_embedding_delete BEFORE DELETE ON embeddings \
             FOR EACH ROW EXECUTE FUNCTION reject_embedding_delete()",
        )
        .execute(&mut conn)
        .unwrap();
    }

    let u = repos.entities.create(&skill()).await.unwrap().uuid();
    let point = PointId::new();
    repos
        .metadata
        .record(row(u, point, EmbeddingKind::FullText, 0))
        .await
        .unwrap();
    repos.sync_states.put(&in_sync(u)).await.unwrap();

    let err = repos.entities.update(u, &expert_skill()).await.unwrap_err();
    assert!(matches!(err, EntityRepositoryError::DatabaseError(_)));

    let stored = repos.entities.find_by_uuid(u).await.unwrap().unwrap();
    assert_eq!(stored.variant, skill());
    assert!(repos.metadata.find_by_point_id(point).await.unwrap().is_some());
    assert!(
        repos
            .sync_states
            .get(u)
            .await
            .unwrap()
            .unwrap()
            .state()
            .is_in_sync()
    );
    assert!(
        repos
            .outbox
            .fetch_point_deletions(DeletionFilter::Unprocessed, Some(u), 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_failed_variant_insert_leaves_no_identity() {
    let Some(repos) = repos() else { return };
    let before = entity_count(&repos);

    let err = repos
        .entities
        .create(&resume_for(Uuid::new_v4()))
        .await
        .unwrap_err();

    assert!(matches!(err, EntityRepositoryError::AllocationFailed(_)));
    assert_eq!(entity_count(&repos), before);
}

#[tokio::test]
async fn test_resume_reference_must_be_a_job_description() {
    let Some(repos) = repos() else { return };
    let not_a_job = repos.entities.create(&skill()).await.unwrap().uuid();

    let err = repos
        .entities
        .create(&resume_for(not_a_job))
        .await
        .unwrap_err();
    assert!(matches!(err, EntityRepositoryError::ValidationError(_)));

    let resume = repos
        .entities
        .create(&EntityVariant::Resume(Resume {
            profile_id: 1,
            ..Default::default()
        }))
        .await
        .unwrap();
    let err = repos
        .entities
        .update(resume.uuid(), &resume_for(not_a_job))
        .await
        .unwrap_err();
    assert!(matches!(err, EntityRepositoryError::ValidationError(_)));
}

#[tokio::test]
async fn test_count_by_model_splits_rows_per_model() {
    let Some(repos) = repos() else { return };
    let u = repos.entities.create(&work_experience()).await.unwrap().uuid();
    let current = format!("minilm-{}", Uuid::new_v4());
    let legacy = format!("mpnet-{}", Uuid::new_v4());

    for (kind, chunk, model) in [
        (EmbeddingKind::FullText, 0, &current),
        (EmbeddingKind::FullText, 1, &current),
        (EmbeddingKind::Summary, 0, &legacy),
    ] {
        let request = NewEmbeddingMetadata::new(
            u,
            PointId::new(),
            kind,
            chunk,
            Provenance::for_text("chunk text", Some(2), model, None),
        )
        .unwrap();
        repos.metadata.record(request).await.unwrap();
    }

    assert_eq!(repos.metadata.count_by_model(&current).await.unwrap(), 2);
    assert_eq!(repos.metadata.count_by_model(&legacy).await.unwrap(), 1);
    assert_eq!(repos.metadata.count_by_model("unused-model").await.unwrap(), 0);
}

#[tokio::test]
async fn test_slot_conflict_then_invalidate_then_record() {
    let Some(repos) = repos() else { return };
    let u = repos.entities.create(&work_experience()).await.unwrap().uuid();
    let (p1, p2) = (PointId::new(), PointId::new());

    repos
        .metadata
        .record(row(u, p1, EmbeddingKind::FullText, 0))
        .await
        .unwrap();

    let err = repos
        .metadata
        .record(row(u, p2, EmbeddingKind::FullText, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::SlotConflict(_)));

    let removed = repos
        .metadata
        .invalidate(u, Some(EmbeddingKind::FullText))
        .await
        .unwrap();
    assert_eq!(removed, vec![p1]);

    let recorded = repos
        .metadata
        .record(row(u, p2, EmbeddingKind::FullText, 0))
        .await
        .unwrap();
    assert_eq!(recorded.point_id(), p2);

    let queued = repos
        .outbox
        .fetch_point_deletions(DeletionFilter::Pending, Some(u), 10)
        .await
        .unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].point_id(), Some(p1));
}

#[tokio::test]
async fn test_point_id_is_globally_unique() {
    let Some(repos) = repos() else { return };
    let first = repos.entities.create(&work_experience()).await.unwrap().uuid();
    let second = repos.entities.create(&skill()).await.unwrap().uuid();
    let point = PointId::new();

    repos
        .metadata
        .record(row(first, point, EmbeddingKind::FullText, 0))
        .await
        .unwrap();
    let err = repos
        .metadata
        .record(row(second, point, EmbeddingKind::Keywords, 0))
        .await
        .unwrap_err();

    assert!(matches!(err, MetadataError::PointConflict(p) if p == point));
    assert!(listed(&repos, second).await.is_empty());
}

#[tokio::test]
async fn test_record_for_missing_entity_fails() {
    let Some(repos) = repos() else { return };

    let err = repos
        .metadata
        .record(row(Uuid::new_v4(), PointId::new(), EmbeddingKind::Summary, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::EntityNotFound(_)));
}

#[tokio::test]
async fn test_list_for_orders_by_kind_then_chunk_across_pages() {
    let Some(repos) = repos() else { return };
    let u = repos.entities.create(&work_experience()).await.unwrap().uuid();

    for (kind, chunk) in [
        (EmbeddingKind::Keywords, 0),
        (EmbeddingKind::FullText, 1),
        (EmbeddingKind::Summary, 0),
        (EmbeddingKind::FullText, 0),
        (EmbeddingKind::FullText, 2),
    ] {
        repos
            .metadata
            .record(row(u, PointId::new(), kind, chunk))
            .await
            .unwrap();
    }

    let slots: Vec<(EmbeddingKind, i32)> = listed(&repos, u)
        .await
        .iter()
        .map(|m| (m.embedding_kind(), m.chunk_index()))
        .collect();
    assert_eq!(
        slots,
        vec![
            (EmbeddingKind::FullText, 0),
            (EmbeddingKind::FullText, 1),
            (EmbeddingKind::FullText, 2),
            (EmbeddingKind::Summary, 0),
            (EmbeddingKind::Keywords, 0),
        ]
    );

    // Restartable: a second walk sees the same rows.
    assert_eq!(listed(&repos, u).await.len(), 5);
}

#[tokio::test]
async fn test_delete_cascades_and_queues_points() {
    let Some(repos) = repos() else { return };
    let u = repos.entities.create(&work_experience()).await.unwrap().uuid();
    let points = [PointId::new(), PointId::new(), PointId::new()];

    repos
        .metadata
        .record(row(u, points[0], EmbeddingKind::FullText, 0))
        .await
        .unwrap();
    repos
        .metadata
        .record(row(u, points[1], EmbeddingKind::FullText, 1))
        .await
        .unwrap();
    repos
        .metadata
        .record(row(u, points[2], EmbeddingKind::Summary, 0))
        .await
        .unwrap();
    repos
        .sync_states
        .put(&EntitySyncStatus::pending(u))
        .await
        .unwrap();

    let deletion = repos.entities.delete(u).await.unwrap().unwrap();
    let mut queued = deletion.queued_points.clone();
    queued.sort();
    let mut expected = points.to_vec();
    expected.sort();
    assert_eq!(queued, expected);

    assert!(listed(&repos, u).await.is_empty());
    for point in points {
        assert!(repos.metadata.find_by_point_id(point).await.unwrap().is_none());
    }
    assert!(repos.sync_states.get(u).await.unwrap().is_none());

    let events = repos
        .outbox
        .fetch_point_deletions(DeletionFilter::Pending, Some(u), 10)
        .await
        .unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.entity_kind() == Some(EntityKind::WorkExperience)));

    // Deleting again is a no-op.
    assert!(repos.entities.delete(u).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_all_for_is_idempotent() {
    let Some(repos) = repos() else { return };
    let u = repos.entities.create(&skill()).await.unwrap().uuid();
    let point = PointId::new();
    repos
        .metadata
        .record(row(u, point, EmbeddingKind::Keywords, 0))
        .await
        .unwrap();

    assert_eq!(repos.metadata.delete_all_for(u).await.unwrap(), vec![point]);
    assert!(repos.metadata.delete_all_for(u).await.unwrap().is_empty());

    let events = repos
        .outbox
        .fetch_point_deletions(DeletionFilter::Unprocessed, Some(u), 10)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_failed_deletions_are_tracked_separately() {
    let Some(repos) = repos() else { return };
    let u = repos.entities.create(&skill()).await.unwrap().uuid();
    repos
        .metadata
        .record(row(u, PointId::new(), EmbeddingKind::FullText, 0))
        .await
        .unwrap();
    repos.entities.delete(u).await.unwrap();

    let pending = repos
        .outbox
        .fetch_point_deletions(DeletionFilter::Pending, Some(u), 10)
        .await
        .unwrap();
    repos
        .outbox
        .mark_attempt_failed(pending[0].uuid(), "index unavailable")
        .await
        .unwrap();

    let failed = repos
        .outbox
        .fetch_point_deletions(DeletionFilter::Failed, Some(u), 10)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].attempts(), 1);
    assert!(
        repos
            .outbox
            .fetch_point_deletions(DeletionFilter::Pending, Some(u), 10)
            .await
            .unwrap()
            .is_empty()
    );

    repos.outbox.mark_processed(failed[0].uuid()).await.unwrap();
    assert!(
        repos
            .outbox
            .fetch_point_deletions(DeletionFilter::Unprocessed, Some(u), 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_sync_state_for_deleted_entity_is_rejected() {
    let Some(repos) = repos() else { return };
    let u = repos.entities.create(&skill()).await.unwrap().uuid();

    let mut status = EntitySyncStatus::pending(u);
    repos.sync_states.put(&status).await.unwrap();
    status.transition_to(SyncState::InSync).unwrap();
    repos.sync_states.put(&status).await.unwrap();
    assert!(
        repos
            .sync_states
            .get(u)
            .await
            .unwrap()
            .unwrap()
            .state()
            .is_in_sync()
    );

    repos.entities.delete(u).await.unwrap();
    let err = repos
        .sync_states
        .put(&EntitySyncStatus::pending(u))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncStateError::EntityNotFound(_)));
}
