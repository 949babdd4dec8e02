use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{EmbeddingMetadata, EntitySyncStatus, OutboxEvent};

#[derive(Debug, Serialize)]
pub struct EmbeddingMetadataDto {
    pub uuid: Uuid,
    pub point_id: Uuid,
    pub embedding_kind: String,
    pub chunk_index: i32,
    pub content_hash: Option<String>,
    pub text_preview: Option<String>,
    pub token_count: Option<i32>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub created_at: String,
}

impl From<&EmbeddingMetadata> for EmbeddingMetadataDto {
    fn from(metadata: &EmbeddingMetadata) -> Self {
        let provenance = metadata.provenance();
        Self {
            uuid: metadata.uuid(),
            point_id: metadata.point_id().as_uuid(),
            embedding_kind: metadata.embedding_kind().as_str().to_string(),
            chunk_index: metadata.chunk_index(),
            content_hash: metadata.content_hash().map(|h| h.as_str().to_string()),
            text_preview: provenance.text_preview.clone(),
            token_count: provenance.token_count,
            model_name: provenance.model_name.clone(),
            model_version: provenance.model_version.clone(),
            created_at: metadata.created_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntityEmbeddingsDto {
    pub entity_uuid: Uuid,
    pub entity_kind: String,
    pub embeddings: Vec<EmbeddingMetadataDto>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SyncStateDto {
    pub entity_uuid: Uuid,
    pub state: String,
    pub last_error: Option<String>,
    pub attempts: i32,
    pub updated_at: String,
}

impl From<&EntitySyncStatus> for SyncStateDto {
    fn from(status: &EntitySyncStatus) -> Self {
        Self {
            entity_uuid: status.entity_uuid(),
            state: status.state().as_str().to_string(),
            last_error: status.state().error_message().map(str::to_string),
            attempts: status.attempts(),
            updated_at: status.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FailedDeletionDto {
    pub event_uuid: Uuid,
    pub entity_uuid: Uuid,
    pub entity_kind: Option<String>,
    pub point_id: Option<Uuid>,
    pub attempts: i32,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&OutboxEvent> for FailedDeletionDto {
    fn from(event: &OutboxEvent) -> Self {
        Self {
            event_uuid: event.uuid(),
            entity_uuid: event.entity_uuid(),
            entity_kind: event.entity_kind().map(|k| k.as_str().to_string()),
            point_id: event.point_id().map(|p| p.as_uuid()),
            attempts: event.attempts(),
            error: event.error().map(str::to_string),
            created_at: event.created_at().to_rfc3339(),
            updated_at: event.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FailedDeletionsDto {
    pub deletions: Vec<FailedDeletionDto>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct FailedDeletionsQuery {
    pub entity_uuid: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SweepQuery {
    /// Run the sweep inside the request and return its report.
    pub wait: Option<bool>,
}
