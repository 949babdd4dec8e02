use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::application::ports::event_sink::{ReconcileEventSink, SyncTransition};

/// Keeps every published transition in memory.
#[derive(Default)]
pub struct InMemoryEventSink {
    transitions: Mutex<Vec<SyncTransition>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<SyncTransition> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ReconcileEventSink for InMemoryEventSink {
    async fn publish(&self, transition: &SyncTransition) {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transition.clone());
    }
}
