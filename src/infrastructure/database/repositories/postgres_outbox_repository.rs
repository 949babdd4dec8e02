use async_trait::async_trait;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entities::{OutboxEvent, OutboxEventType};
use crate::domain::repositories::{DeletionFilter, OutboxError, OutboxRepository};
use crate::domain::value_objects::{EntityKind, PointId};
use crate::infrastructure::database::models::{NewOutboxEventModel, OutboxEventModel};
use crate::infrastructure::database::schema::outbox_events;
use crate::infrastructure::database::{DbPool, with_connection};

/// Writes one `point_delete` event per point on the caller's connection, so
/// the events commit or roll back with the caller's transaction.
pub fn queue_point_deletions(
    conn: &mut PgConnection,
    entity_uuid: Uuid,
    entity_kind: Option<EntityKind>,
    points: &[PointId],
) -> QueryResult<()> {
    if points.is_empty() {
        return Ok(());
    }

    let events: Vec<NewOutboxEventModel> = points
        .iter()
        .map(|point| {
            NewOutboxEventModel::from(&OutboxEvent::point_delete(entity_uuid, entity_kind, *point))
        })
        .collect();

    diesel::insert_into(outbox_events::table)
        .values(&events)
        .execute(conn)?;
    Ok(())
}

pub struct PostgresOutboxRepository {
    pool: DbPool,
}

impl PostgresOutboxRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxRepository for PostgresOutboxRepository {
    async fn append(&self, event: &OutboxEvent) -> Result<(), OutboxError> {
        let model = NewOutboxEventModel::from(event);

        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, OutboxError, _>(|conn| {
                diesel::insert_into(outbox_events::table)
                    .values(&model)
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn fetch_point_deletions(
        &self,
        filter: DeletionFilter,
        entity_uuid: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, OutboxError> {
        with_connection(&self.pool, move |conn| {
            let mut query = outbox_events::table
                .filter(outbox_events::event_type.eq(OutboxEventType::PointDelete.as_str()))
                .filter(outbox_events::processed.eq(false))
                .into_boxed();

            query = match filter {
                DeletionFilter::Pending => query.filter(outbox_events::error.is_null()),
                DeletionFilter::Failed => query.filter(outbox_events::error.is_not_null()),
                DeletionFilter::Unprocessed => query,
            };

            if let Some(entity_uuid) = entity_uuid {
                query = query.filter(outbox_events::entity_uuid.eq(entity_uuid));
            }

            query
                .order((outbox_events::created_at.asc(), outbox_events::id.asc()))
                .limit(limit)
                .select(OutboxEventModel::as_select())
                .load(conn)?
                .into_iter()
                .map(|model| OutboxEvent::try_from(model).map_err(OutboxError::ValidationError))
                .collect()
        })
        .await
    }

    async fn mark_processed(&self, event_uuid: Uuid) -> Result<(), OutboxError> {
        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, OutboxError, _>(|conn| {
                let updated = diesel::update(
                    outbox_events::table.filter(outbox_events::uuid.eq(event_uuid)),
                )
                .set((
                    outbox_events::processed.eq(true),
                    outbox_events::error.eq(None::<String>),
                ))
                .execute(conn)?;

                if updated == 0 {
                    return Err(OutboxError::NotFound(event_uuid));
                }
                Ok(())
            })
        })
        .await
    }

    async fn mark_attempt_failed(&self, event_uuid: Uuid, error: &str) -> Result<(), OutboxError> {
        let error = error.to_string();

        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, OutboxError, _>(|conn| {
                let updated = diesel::update(
                    outbox_events::table.filter(outbox_events::uuid.eq(event_uuid)),
                )
                .set((
                    outbox_events::attempts.eq(outbox_events::attempts + 1),
                    outbox_events::error.eq(Some(error)),
                ))
                .execute(conn)?;

                if updated == 0 {
                    return Err(OutboxError::NotFound(event_uuid));
                }
                Ok(())
            })
        })
        .await
    }
}
