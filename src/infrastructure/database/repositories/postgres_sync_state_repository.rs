use async_trait::async_trait;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entities::EntitySyncStatus;
use crate::domain::repositories::{SyncStateError, SyncStateRepository};
use crate::domain::value_objects::SyncState;
use crate::infrastructure::database::errors::is_foreign_key_violation;
use crate::infrastructure::database::models::SyncStateModel;
use crate::infrastructure::database::schema::embedding_sync_states;
use crate::infrastructure::database::{DbPool, with_connection};

pub struct PostgresSyncStateRepository {
    pool: DbPool,
}

impl PostgresSyncStateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_status(model: SyncStateModel) -> Result<EntitySyncStatus, SyncStateError> {
    EntitySyncStatus::try_from(model).map_err(SyncStateError::ValidationError)
}

#[async_trait]
impl SyncStateRepository for PostgresSyncStateRepository {
    async fn get(&self, entity_uuid: Uuid) -> Result<Option<EntitySyncStatus>, SyncStateError> {
        with_connection(&self.pool, move |conn| {
            embedding_sync_states::table
                .find(entity_uuid)
                .select(SyncStateModel::as_select())
                .first(conn)
                .optional()?
                .map(to_status)
                .transpose()
        })
        .await
    }

    async fn put(&self, status: &EntitySyncStatus) -> Result<(), SyncStateError> {
        let model = SyncStateModel::from(status);
        let entity_uuid = model.entity_uuid;

        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, SyncStateError, _>(|conn| {
                diesel::insert_into(embedding_sync_states::table)
                    .values(&model)
                    .on_conflict(embedding_sync_states::entity_uuid)
                    .do_update()
                    .set(&model)
                    .execute(conn)
                    .map_err(|e| {
                        if is_foreign_key_violation(&e) {
                            SyncStateError::EntityNotFound(entity_uuid)
                        } else {
                            SyncStateError::from(e)
                        }
                    })?;
                Ok(())
            })
        })
        .await
    }

    async fn list_by_state(
        &self,
        state: &SyncState,
        limit: i64,
    ) -> Result<Vec<EntitySyncStatus>, SyncStateError> {
        let tag = state.as_str();

        with_connection(&self.pool, move |conn| {
            embedding_sync_states::table
                .filter(embedding_sync_states::state.eq(tag))
                .order(embedding_sync_states::updated_at.asc())
                .limit(limit)
                .select(SyncStateModel::as_select())
                .load(conn)?
                .into_iter()
                .map(to_status)
                .collect()
        })
        .await
    }
}
