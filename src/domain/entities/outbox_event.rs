use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{EntityKind, PointId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxEventType {
    /// External point must be removed from the vector index.
    PointDelete,
    /// Audit record of a reconciler state transition.
    SyncStateChanged,
}

impl OutboxEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxEventType::PointDelete => "point_delete",
            OutboxEventType::SyncStateChanged => "sync_state_changed",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "point_delete" => Ok(OutboxEventType::PointDelete),
            "sync_state_changed" => Ok(OutboxEventType::SyncStateChanged),
            _ => Err(format!("Invalid outbox event type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboxEvent {
    uuid: Uuid,
    event_type: OutboxEventType,
    entity_uuid: Uuid,
    entity_kind: Option<EntityKind>,
    point_id: Option<PointId>,
    payload: Option<serde_json::Value>,
    processed: bool,
    attempts: i32,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OutboxEvent {
    pub fn point_delete(
        entity_uuid: Uuid,
        entity_kind: Option<EntityKind>,
        point_id: PointId,
    ) -> Self {
        Self::new(
            OutboxEventType::PointDelete,
            entity_uuid,
            entity_kind,
            Some(point_id),
            None,
        )
    }

    pub fn sync_state_changed(
        entity_uuid: Uuid,
        entity_kind: Option<EntityKind>,
        payload: serde_json::Value,
    ) -> Self {
        let mut event = Self::new(
            OutboxEventType::SyncStateChanged,
            entity_uuid,
            entity_kind,
            None,
            Some(payload),
        );
        // Audit entries carry no work for the reconciler.
        event.processed = true;
        event
    }

    fn new(
        event_type: OutboxEventType,
        entity_uuid: Uuid,
        entity_kind: Option<EntityKind>,
        point_id: Option<PointId>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            event_type,
            entity_uuid,
            entity_kind,
            point_id,
            payload,
            processed: false,
            attempts: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_database(
        uuid: Uuid,
        event_type: OutboxEventType,
        entity_uuid: Uuid,
        entity_kind: Option<EntityKind>,
        point_id: Option<PointId>,
        payload: Option<serde_json::Value>,
        processed: bool,
        attempts: i32,
        error: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid,
            event_type,
            entity_uuid,
            entity_kind,
            point_id,
            payload,
            processed,
            attempts,
            error,
            created_at,
            updated_at,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn event_type(&self) -> OutboxEventType {
        self.event_type
    }

    pub fn entity_uuid(&self) -> Uuid {
        self.entity_uuid
    }

    pub fn entity_kind(&self) -> Option<EntityKind> {
        self.entity_kind
    }

    pub fn point_id(&self) -> Option<PointId> {
        self.point_id
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn attempts(&self) -> i32 {
        self.attempts
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// A point deletion that exhausted its retries and awaits out-of-band cleanup.
    pub fn is_failed(&self) -> bool {
        !self.processed && self.error.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn mark_processed(&mut self) {
        self.processed = true;
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.attempts += 1;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_delete_starts_pending() {
        let event = OutboxEvent::point_delete(Uuid::new_v4(), None, PointId::new());
        assert_eq!(event.event_type(), OutboxEventType::PointDelete);
        assert!(!event.is_processed());
        assert!(!event.is_failed());
        assert!(event.point_id().is_some());
    }

    #[test]
    fn test_audit_events_are_born_processed() {
        let event = OutboxEvent::sync_state_changed(
            Uuid::new_v4(),
            Some(EntityKind::Skill),
            serde_json::json!({"to": "in_sync"}),
        );
        assert!(event.is_processed());
        assert_eq!(
            OutboxEventType::from_string(event.event_type().as_str()).unwrap(),
            OutboxEventType::SyncStateChanged
        );
    }
}
