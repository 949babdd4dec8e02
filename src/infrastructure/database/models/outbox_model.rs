use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entities::{OutboxEvent, OutboxEventType};
use crate::domain::value_objects::{EntityKind, PointId};
use crate::infrastructure::database::schema::outbox_events;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = outbox_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEventModel {
    pub id: i32,
    pub uuid: Uuid,
    pub event_type: String,
    pub entity_uuid: Uuid,
    pub entity_kind: Option<String>,
    pub point_id: Option<Uuid>,
    pub payload: Option<serde_json::Value>,
    pub processed: bool,
    pub attempts: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = outbox_events)]
pub struct NewOutboxEventModel {
    pub uuid: Uuid,
    pub event_type: String,
    pub entity_uuid: Uuid,
    pub entity_kind: Option<String>,
    pub point_id: Option<Uuid>,
    pub payload: Option<serde_json::Value>,
    pub processed: bool,
    pub attempts: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&OutboxEvent> for NewOutboxEventModel {
    fn from(event: &OutboxEvent) -> Self {
        Self {
            uuid: event.uuid(),
            event_type: event.event_type().as_str().to_string(),
            entity_uuid: event.entity_uuid(),
            entity_kind: event.entity_kind().map(|k| k.as_str().to_string()),
            point_id: event.point_id().map(|p| p.as_uuid()),
            payload: event.payload().cloned(),
            processed: event.is_processed(),
            attempts: event.attempts(),
            error: event.error().map(|e| e.to_string()),
            created_at: event.created_at(),
            updated_at: event.updated_at(),
        }
    }
}

impl TryFrom<OutboxEventModel> for OutboxEvent {
    type Error = String;

    fn try_from(model: OutboxEventModel) -> Result<Self, Self::Error> {
        let event_type = OutboxEventType::from_string(&model.event_type)?;
        let entity_kind = model
            .entity_kind
            .as_deref()
            .map(EntityKind::from_string)
            .transpose()?;

        Ok(OutboxEvent::from_database(
            model.uuid,
            event_type,
            model.entity_uuid,
            entity_kind,
            model.point_id.map(PointId::from_uuid),
            model.payload,
            model.processed,
            model.attempts,
            model.error,
            model.created_at,
            model.updated_at,
        ))
    }
}
