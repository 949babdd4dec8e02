use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::SyncState;

/// Persisted reconciler state for one live entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySyncStatus {
    entity_uuid: Uuid,
    state: SyncState,
    attempts: i32,
    updated_at: DateTime<Utc>,
}

impl EntitySyncStatus {
    pub fn pending(entity_uuid: Uuid) -> Self {
        Self {
            entity_uuid,
            state: SyncState::PendingEmbed,
            attempts: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn from_database(
        entity_uuid: Uuid,
        state: SyncState,
        attempts: i32,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_uuid,
            state,
            attempts,
            updated_at,
        }
    }

    pub fn entity_uuid(&self) -> Uuid {
        self.entity_uuid
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn attempts(&self) -> i32 {
        self.attempts
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn transition_to(&mut self, next: SyncState) -> Result<(), String> {
        if self.state == next && !matches!(next, SyncState::PendingEmbed) {
            return Ok(());
        }

        if !self.state.can_transition_to(&next) {
            return Err(format!(
                "Cannot transition entity {} from {} to {}",
                self.entity_uuid, self.state, next
            ));
        }

        match &next {
            SyncState::Failed(_) => self.attempts += 1,
            SyncState::InSync => self.attempts = 0,
            _ => {}
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_count_attempts() {
        let mut status = EntitySyncStatus::pending(Uuid::new_v4());

        status
            .transition_to(SyncState::Failed("timeout".to_string()))
            .unwrap();
        status.transition_to(SyncState::PendingEmbed).unwrap();
        status
            .transition_to(SyncState::Failed("timeout".to_string()))
            .unwrap();
        assert_eq!(status.attempts(), 2);

        status.transition_to(SyncState::PendingEmbed).unwrap();
        status.transition_to(SyncState::InSync).unwrap();
        assert_eq!(status.attempts(), 0);
    }

    #[test]
    fn test_rejects_invalid_transition() {
        let mut status = EntitySyncStatus::pending(Uuid::new_v4());
        status.transition_to(SyncState::InSync).unwrap();

        assert!(
            status
                .transition_to(SyncState::Failed("late".to_string()))
                .is_err()
        );
        assert!(status.state().is_in_sync());
    }
}
