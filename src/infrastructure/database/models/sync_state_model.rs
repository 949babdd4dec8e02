use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entities::EntitySyncStatus;
use crate::domain::value_objects::SyncState;
use crate::infrastructure::database::schema::embedding_sync_states;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = embedding_sync_states)]
#[diesel(primary_key(entity_uuid))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SyncStateModel {
    pub entity_uuid: Uuid,
    pub state: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&EntitySyncStatus> for SyncStateModel {
    fn from(status: &EntitySyncStatus) -> Self {
        Self {
            entity_uuid: status.entity_uuid(),
            state: status.state().as_str().to_string(),
            attempts: status.attempts(),
            last_error: status.state().error_message().map(|e| e.to_string()),
            updated_at: status.updated_at(),
        }
    }
}

impl TryFrom<SyncStateModel> for EntitySyncStatus {
    type Error = String;

    fn try_from(model: SyncStateModel) -> Result<Self, Self::Error> {
        let state = SyncState::from_parts(&model.state, model.last_error.as_deref())?;
        Ok(EntitySyncStatus::from_database(
            model.entity_uuid,
            state,
            model.attempts,
            model.updated_at,
        ))
    }
}
