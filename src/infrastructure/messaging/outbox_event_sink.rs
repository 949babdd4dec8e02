use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::application::ports::event_sink::{ReconcileEventSink, SyncTransition};
use crate::domain::entities::OutboxEvent;
use crate::domain::repositories::OutboxRepository;

/// Persists every transition as a processed `sync_state_changed` outbox row,
/// giving an audit trail next to the relational data.
pub struct OutboxEventSink {
    outbox: Arc<dyn OutboxRepository>,
}

impl OutboxEventSink {
    pub fn new(outbox: Arc<dyn OutboxRepository>) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl ReconcileEventSink for OutboxEventSink {
    async fn publish(&self, transition: &SyncTransition) {
        let payload = match serde_json::to_value(transition) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Could not serialize sync transition");
                return;
            }
        };

        let event = OutboxEvent::sync_state_changed(
            transition.entity_uuid,
            transition.entity_kind,
            payload,
        );

        if let Err(e) = self.outbox.append(&event).await {
            warn!(
                entity_uuid = %transition.entity_uuid,
                error = %e,
                "Could not record sync transition"
            );
        }
    }
}
