use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entities::{EmbeddingMetadata, Provenance};
use crate::domain::value_objects::{ContentHash, EmbeddingKind, PointId};
use crate::infrastructure::database::schema::embeddings;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = embeddings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmbeddingModel {
    pub id: i32,
    pub uuid: Uuid,
    pub entity_uuid: Uuid,
    pub point_id: Uuid,
    pub embedding_kind: String,
    pub chunk_index: i32,
    pub text_preview: Option<String>,
    pub token_count: Option<i32>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub content_hash: Option<String>,
    pub metadata_json: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = embeddings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewEmbeddingModel {
    pub uuid: Uuid,
    pub entity_uuid: Uuid,
    pub point_id: Uuid,
    pub embedding_kind: String,
    pub chunk_index: i32,
    pub text_preview: Option<String>,
    pub token_count: Option<i32>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub content_hash: Option<String>,
    pub metadata_json: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&EmbeddingMetadata> for NewEmbeddingModel {
    fn from(metadata: &EmbeddingMetadata) -> Self {
        let provenance = metadata.provenance();
        Self {
            uuid: metadata.uuid(),
            entity_uuid: metadata.entity_uuid(),
            point_id: metadata.point_id().as_uuid(),
            embedding_kind: metadata.embedding_kind().as_str().to_string(),
            chunk_index: metadata.chunk_index(),
            text_preview: provenance.text_preview.clone(),
            token_count: provenance.token_count,
            model_name: provenance.model_name.clone(),
            model_version: provenance.model_version.clone(),
            content_hash: provenance.content_hash.as_ref().map(|h| h.to_string()),
            metadata_json: provenance.extra.clone(),
            created_at: metadata.created_at(),
            updated_at: metadata.updated_at(),
        }
    }
}

impl TryFrom<EmbeddingModel> for EmbeddingMetadata {
    type Error = String;

    fn try_from(model: EmbeddingModel) -> Result<Self, Self::Error> {
        let embedding_kind = EmbeddingKind::from_string(&model.embedding_kind)?;
        let content_hash = model.content_hash.map(ContentHash::new).transpose()?;

        Ok(EmbeddingMetadata::from_database(
            model.uuid,
            model.entity_uuid,
            PointId::from_uuid(model.point_id),
            embedding_kind,
            model.chunk_index,
            Provenance {
                text_preview: model.text_preview,
                token_count: model.token_count,
                model_name: model.model_name,
                model_version: model.model_version,
                content_hash,
                extra: model.metadata_json,
            },
            model.created_at,
            model.updated_at,
        ))
    }
}
