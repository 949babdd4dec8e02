use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{EntityKind, PointId, SyncState};

/// A Reconciler state change as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncTransition {
    pub entity_uuid: Uuid,
    pub entity_kind: Option<EntityKind>,
    pub from: Option<SyncState>,
    pub to: SyncState,
    pub point_id: Option<PointId>,
    pub at: DateTime<Utc>,
}

impl SyncTransition {
    pub fn new(entity_uuid: Uuid, from: Option<SyncState>, to: SyncState) -> Self {
        Self {
            entity_uuid,
            entity_kind: None,
            from,
            to,
            point_id: None,
            at: Utc::now(),
        }
    }

    pub fn with_kind(mut self, kind: Option<EntityKind>) -> Self {
        self.entity_kind = kind;
        self
    }

    pub fn with_point(mut self, point_id: PointId) -> Self {
        self.point_id = Some(point_id);
        self
    }
}

/// Subscriber for Reconciler transitions. Implementations swallow their own
/// failures; publishing never fails the caller.
#[async_trait]
pub trait ReconcileEventSink: Send + Sync {
    async fn publish(&self, transition: &SyncTransition);
}
