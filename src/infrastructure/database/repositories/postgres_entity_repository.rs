use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use super::postgres_embedding_metadata_repository::remove_rows;
use super::postgres_outbox_repository::queue_point_deletions;
use super::variant_store;
use crate::domain::entities::{DomainEntity, EntityRecord, EntitySyncStatus, EntityVariant};
use crate::domain::repositories::{
    EntityDeletion, EntityRepository, EntityRepositoryError, EntityUpdate,
};
use crate::domain::value_objects::{EntityKind, PointId, SyncState};
use crate::infrastructure::database::models::{EntityModel, NewEntityModel, SyncStateModel};
use crate::infrastructure::database::schema::{embedding_sync_states, embeddings, entities};
use crate::infrastructure::database::{DbPool, with_connection};

pub struct PostgresEntityRepository {
    pool: DbPool,
}

impl PostgresEntityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_record(model: EntityModel) -> Result<EntityRecord, EntityRepositoryError> {
    EntityRecord::try_from(model).map_err(EntityRepositoryError::ValidationError)
}

fn to_domain(
    record: EntityRecord,
    variant: EntityVariant,
) -> Result<DomainEntity, EntityRepositoryError> {
    DomainEntity::new(record, variant).map_err(EntityRepositoryError::ValidationError)
}

fn find_row(
    conn: &mut PgConnection,
    uuid: Uuid,
    lock: bool,
) -> Result<Option<EntityRecord>, EntityRepositoryError> {
    let query = entities::table
        .filter(entities::uuid.eq(uuid))
        .select(EntityModel::as_select());

    let model = if lock {
        query.for_update().get_result(conn).optional()?
    } else {
        query.get_result(conn).optional()?
    };

    model.map(to_record).transpose()
}

fn load_variant(
    conn: &mut PgConnection,
    record: &EntityRecord,
) -> Result<EntityVariant, EntityRepositoryError> {
    variant_store::load(conn, record.kind(), record.local_key())?.ok_or(
        EntityRepositoryError::MissingVariant {
            uuid: record.uuid(),
            kind: record.kind(),
        },
    )
}

/// A resume may only point at a job description. Dangling references are left
/// to the foreign key.
fn check_references(
    conn: &mut PgConnection,
    variant: &EntityVariant,
) -> Result<(), EntityRepositoryError> {
    let EntityVariant::Resume(resume) = variant else {
        return Ok(());
    };
    let Some(target) = resume.job_description_uuid else {
        return Ok(());
    };

    let target_kind = entities::table
        .filter(entities::uuid.eq(target))
        .select(entities::kind)
        .get_result::<String>(conn)
        .optional()?;

    match target_kind {
        Some(kind) if kind != EntityKind::JobDescription.as_str() => {
            Err(EntityRepositoryError::ValidationError(format!(
                "job_description_uuid {} refers to a {}, not a job_description",
                target, kind
            )))
        }
        _ => Ok(()),
    }
}

/// Moves the entity's sync state to `PendingEmbed` on the caller's
/// connection. Returns the state it replaced.
fn mark_stale(
    conn: &mut PgConnection,
    entity_uuid: Uuid,
) -> Result<Option<SyncState>, EntityRepositoryError> {
    let current = embedding_sync_states::table
        .find(entity_uuid)
        .select(SyncStateModel::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .map(EntitySyncStatus::try_from)
        .transpose()
        .map_err(EntityRepositoryError::ValidationError)?;

    let prior = current.as_ref().map(|status| status.state().clone());
    let mut status = current.unwrap_or_else(|| EntitySyncStatus::pending(entity_uuid));
    if status.transition_to(SyncState::PendingEmbed).is_err() {
        return Ok(prior);
    }

    let model = SyncStateModel::from(&status);
    diesel::insert_into(embedding_sync_states::table)
        .values(&model)
        .on_conflict(embedding_sync_states::entity_uuid)
        .do_update()
        .set(&model)
        .execute(conn)?;
    Ok(prior)
}

#[async_trait]
impl EntityRepository for PostgresEntityRepository {
    async fn create(&self, variant: &EntityVariant) -> Result<DomainEntity, EntityRepositoryError> {
        let variant = variant.clone();

        let entity = with_connection(&self.pool, move |conn| {
            conn.transaction::<_, EntityRepositoryError, _>(|conn| {
                let model = diesel::insert_into(entities::table)
                    .values(NewEntityModel::allocate(variant.kind()))
                    .returning(EntityModel::as_returning())
                    .get_result(conn)
                    .map_err(|e| EntityRepositoryError::AllocationFailed(e.to_string()))?;

                check_references(conn, &variant)?;
                variant_store::insert(conn, model.id, &variant)
                    .map_err(|e| EntityRepositoryError::AllocationFailed(e.to_string()))?;
                to_domain(to_record(model)?, variant)
            })
        })
        .await?;

        debug!(entity_uuid = %entity.uuid(), kind = %entity.kind(), "Entity allocated");
        Ok(entity)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<DomainEntity>, EntityRepositoryError> {
        with_connection(&self.pool, move |conn| {
            let Some(record) = find_row(conn, uuid, false)? else {
                return Ok(None);
            };
            let variant = load_variant(conn, &record)?;
            to_domain(record, variant).map(Some)
        })
        .await
    }

    async fn exists(&self, uuid: Uuid) -> Result<bool, EntityRepositoryError> {
        with_connection(&self.pool, move |conn| {
            diesel::select(diesel::dsl::exists(
                entities::table.filter(entities::uuid.eq(uuid)),
            ))
            .get_result::<bool>(conn)
            .map_err(EntityRepositoryError::from)
        })
        .await
    }

    async fn update(
        &self,
        uuid: Uuid,
        variant: &EntityVariant,
    ) -> Result<EntityUpdate, EntityRepositoryError> {
        let variant = variant.clone();

        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, EntityRepositoryError, _>(|conn| {
                let record = find_row(conn, uuid, true)?
                    .ok_or(EntityRepositoryError::NotFound(uuid))?;

                if record.kind() != variant.kind() {
                    return Err(EntityRepositoryError::KindMismatch {
                        uuid,
                        existing: record.kind(),
                        requested: variant.kind(),
                    });
                }

                check_references(conn, &variant)?;
                let kind = record.kind();
                let previous_variant = load_variant(conn, &record)?;
                variant_store::update(conn, record.local_key(), &variant)?;

                let touched = diesel::update(entities::table.find(record.local_key()))
                    .set(entities::updated_at.eq(Utc::now()))
                    .returning(EntityModel::as_returning())
                    .get_result(conn)?;

                let previous = to_domain(record, previous_variant)?;
                let current = to_domain(to_record(touched)?, variant)?;
                let invalidated_kinds = current.variant.affected_kinds(&previous.variant);

                let mut queued_points = Vec::new();
                for embedding_kind in &invalidated_kinds {
                    queued_points.extend(remove_rows(
                        conn,
                        uuid,
                        Some(kind),
                        Some(*embedding_kind),
                    )?);
                }

                let prior_sync_state = if invalidated_kinds.is_empty() {
                    None
                } else {
                    mark_stale(conn, uuid)?
                };

                Ok(EntityUpdate {
                    previous,
                    current,
                    invalidated_kinds,
                    queued_points,
                    prior_sync_state,
                })
            })
        })
        .await
    }

    async fn delete(&self, uuid: Uuid) -> Result<Option<EntityDeletion>, EntityRepositoryError> {
        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, EntityRepositoryError, _>(|conn| {
                let Some(record) = find_row(conn, uuid, true)? else {
                    return Ok(None);
                };

                let queued_points: Vec<PointId> = embeddings::table
                    .filter(embeddings::entity_uuid.eq(uuid))
                    .order((embeddings::embedding_kind.asc(), embeddings::chunk_index.asc()))
                    .select(embeddings::point_id)
                    .load::<Uuid>(conn)?
                    .into_iter()
                    .map(PointId::from_uuid)
                    .collect();

                queue_point_deletions(conn, uuid, Some(record.kind()), &queued_points)?;

                // Variant, metadata and sync state rows go by cascade.
                diesel::delete(entities::table.find(record.local_key())).execute(conn)?;

                Ok(Some(EntityDeletion {
                    record,
                    queued_points,
                }))
            })
        })
        .await
    }

    async fn list_kind_updated_since(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<EntityRecord>, EntityRepositoryError> {
        with_connection(&self.pool, move |conn| {
            entities::table
                .filter(entities::kind.eq(kind.as_str()))
                .filter(entities::updated_at.ge(since))
                .order((entities::updated_at.asc(), entities::id.asc()))
                .limit(limit)
                .select(EntityModel::as_select())
                .load(conn)?
                .into_iter()
                .map(to_record)
                .collect()
        })
        .await
    }

    async fn count_by_kind(&self) -> Result<Vec<(EntityKind, i64)>, EntityRepositoryError> {
        with_connection(&self.pool, move |conn| {
            let rows = entities::table
                .group_by(entities::kind)
                .select((entities::kind, diesel::dsl::count_star()))
                .load::<(String, i64)>(conn)?;

            let mut counts = rows
                .into_iter()
                .map(|(kind, count)| {
                    EntityKind::from_string(&kind)
                        .map(|kind| (kind, count))
                        .map_err(EntityRepositoryError::ValidationError)
                })
                .collect::<Result<Vec<_>, _>>()?;
            counts.sort_by_key(|(kind, _)| *kind);
            Ok(counts)
        })
        .await
    }

    async fn find_orphaned_entities(&self) -> Result<Vec<EntityRecord>, EntityRepositoryError> {
        with_connection(&self.pool, move |conn| {
            let mut orphans = Vec::new();
            for kind in EntityKind::ALL {
                for model in variant_store::orphans(conn, kind)? {
                    orphans.push(to_record(model)?);
                }
            }
            Ok(orphans)
        })
        .await
    }
}
