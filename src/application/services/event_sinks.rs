use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, warn};

use crate::application::ports::event_sink::{ReconcileEventSink, SyncTransition};
use crate::domain::value_objects::SyncState;

/// Writes every transition to the log. Failures are logged at `warn`.
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

#[async_trait]
impl ReconcileEventSink for TracingEventSink {
    async fn publish(&self, transition: &SyncTransition) {
        let from = transition
            .from
            .as_ref()
            .map(SyncState::as_str)
            .unwrap_or("none");
        let kind = transition
            .entity_kind
            .map(|kind| kind.as_str())
            .unwrap_or("unknown");
        let point_id = transition.point_id.map(|point| point.to_string());

        match &transition.to {
            SyncState::Failed(reason) => warn!(
                entity_uuid = %transition.entity_uuid,
                kind,
                from,
                point_id = point_id.as_deref(),
                reason = reason.as_str(),
                "Embedding sync failed"
            ),
            to => info!(
                entity_uuid = %transition.entity_uuid,
                kind,
                from,
                to = to.as_str(),
                point_id = point_id.as_deref(),
                "Embedding sync state changed"
            ),
        }
    }
}

/// Forwards each transition to all inner sinks concurrently.
#[derive(Default, Clone)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn ReconcileEventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<Arc<dyn ReconcileEventSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn ReconcileEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ReconcileEventSink for FanoutEventSink {
    async fn publish(&self, transition: &SyncTransition) {
        join_all(self.sinks.iter().map(|sink| sink.publish(transition))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::InMemoryEventSink;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_fanout_reaches_every_sink() {
        let first = Arc::new(InMemoryEventSink::new());
        let second = Arc::new(InMemoryEventSink::new());
        let fanout = FanoutEventSink::default()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(TracingEventSink));

        let transition = SyncTransition::new(
            Uuid::new_v4(),
            Some(SyncState::PendingEmbed),
            SyncState::Failed("index down".to_string()),
        );
        fanout.publish(&transition).await;

        assert_eq!(fanout.len(), 3);
        assert_eq!(first.transitions(), vec![transition.clone()]);
        assert_eq!(second.transitions(), vec![transition]);
    }
}
