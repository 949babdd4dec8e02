use serde::{Deserialize, Serialize};

/// Reconciler state of one entity against the external vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SyncState {
    InSync,
    PendingEmbed,
    PendingDelete,
    Failed(String),
}

impl SyncState {
    pub fn is_in_sync(&self) -> bool {
        matches!(self, SyncState::InSync)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SyncState::Failed(_))
    }

    pub fn can_transition_to(&self, next: &SyncState) -> bool {
        match (self, next) {
            // Entity deletion always wins.
            (_, SyncState::PendingDelete) => !matches!(self, SyncState::PendingDelete),
            (SyncState::PendingDelete, SyncState::Failed(_)) => true,
            (SyncState::PendingDelete, _) => false,
            (SyncState::InSync, SyncState::PendingEmbed) => true,
            (SyncState::PendingEmbed, SyncState::PendingEmbed) => true,
            (SyncState::PendingEmbed, SyncState::InSync) => true,
            (SyncState::PendingEmbed, SyncState::Failed(_)) => true,
            (SyncState::Failed(_), SyncState::PendingEmbed) => true,
            _ => false,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SyncState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Short tag persisted in `embedding_sync_states.state`; the failure reason
    /// lives in `last_error`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::InSync => "in_sync",
            SyncState::PendingEmbed => "pending_embed",
            SyncState::PendingDelete => "pending_delete",
            SyncState::Failed(_) => "failed",
        }
    }

    pub fn from_parts(state: &str, last_error: Option<&str>) -> Result<Self, String> {
        match state {
            "in_sync" => Ok(SyncState::InSync),
            "pending_embed" => Ok(SyncState::PendingEmbed),
            "pending_delete" => Ok(SyncState::PendingDelete),
            "failed" => Ok(SyncState::Failed(
                last_error.unwrap_or("Unknown error").to_string(),
            )),
            other => Err(format!("Invalid sync state: {}", other)),
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::PendingEmbed
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
