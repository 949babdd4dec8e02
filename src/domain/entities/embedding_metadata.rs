use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{ContentHash, EmbeddingKind, PointId};

pub const TEXT_PREVIEW_CHARS: usize = 200;

/// Where an embedding came from. Kept relationally so audits and cost
/// accounting never need the vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub text_preview: Option<String>,
    pub token_count: Option<i32>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub content_hash: Option<ContentHash>,
    pub extra: Option<serde_json::Value>,
}

impl Provenance {
    /// Builds provenance for the chunk text that was embedded.
    pub fn for_text(
        text: &str,
        token_count: Option<i32>,
        model_name: impl Into<String>,
        model_version: Option<String>,
    ) -> Self {
        Self {
            text_preview: Some(preview(text)),
            token_count,
            model_name: Some(model_name.into()),
            model_version,
            content_hash: Some(ContentHash::of_text(text)),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

pub fn preview(text: &str) -> String {
    text.chars().take(TEXT_PREVIEW_CHARS).collect()
}

/// Request to record one embedding slot.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmbeddingMetadata {
    pub entity_uuid: Uuid,
    pub point_id: PointId,
    pub embedding_kind: EmbeddingKind,
    pub chunk_index: i32,
    pub provenance: Provenance,
}

impl NewEmbeddingMetadata {
    pub fn new(
        entity_uuid: Uuid,
        point_id: PointId,
        embedding_kind: EmbeddingKind,
        chunk_index: i32,
        provenance: Provenance,
    ) -> Result<Self, String> {
        if chunk_index < 0 {
            return Err(format!("Chunk index must be non-negative, got {}", chunk_index));
        }

        Ok(Self {
            entity_uuid,
            point_id,
            embedding_kind,
            chunk_index,
            provenance,
        })
    }

    pub fn slot(&self) -> EmbeddingSlot {
        EmbeddingSlot {
            entity_uuid: self.entity_uuid,
            embedding_kind: self.embedding_kind,
            chunk_index: self.chunk_index,
        }
    }
}

/// The `(entity_uuid, embedding_kind, chunk_index)` triple. At most one
/// metadata row may occupy a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EmbeddingSlot {
    pub entity_uuid: Uuid,
    pub embedding_kind: EmbeddingKind,
    pub chunk_index: i32,
}

impl std::fmt::Display for EmbeddingSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}#{}",
            self.entity_uuid, self.embedding_kind, self.chunk_index
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingMetadata {
    uuid: Uuid,
    entity_uuid: Uuid,
    point_id: PointId,
    embedding_kind: EmbeddingKind,
    chunk_index: i32,
    provenance: Provenance,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EmbeddingMetadata {
    pub fn new(request: NewEmbeddingMetadata) -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            entity_uuid: request.entity_uuid,
            point_id: request.point_id,
            embedding_kind: request.embedding_kind,
            chunk_index: request.chunk_index,
            provenance: request.provenance,
            created_at: now,
            updated_at: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_database(
        uuid: Uuid,
        entity_uuid: Uuid,
        point_id: PointId,
        embedding_kind: EmbeddingKind,
        chunk_index: i32,
        provenance: Provenance,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid,
            entity_uuid,
            point_id,
            embedding_kind,
            chunk_index,
            provenance,
            created_at,
            updated_at,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn entity_uuid(&self) -> Uuid {
        self.entity_uuid
    }

    pub fn point_id(&self) -> PointId {
        self.point_id
    }

    pub fn embedding_kind(&self) -> EmbeddingKind {
        self.embedding_kind
    }

    pub fn chunk_index(&self) -> i32 {
        self.chunk_index
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.provenance.content_hash.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn slot(&self) -> EmbeddingSlot {
        EmbeddingSlot {
            entity_uuid: self.entity_uuid,
            embedding_kind: self.embedding_kind,
            chunk_index: self.chunk_index,
        }
    }

    pub fn matches_text(&self, text: &str) -> bool {
        self.content_hash()
            .is_some_and(|hash| *hash == ContentHash::of_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_is_char_bounded() {
        let text = "é".repeat(500);
        let provenance = Provenance::for_text(&text, Some(12), "bge-small", None);
        assert_eq!(
            provenance.text_preview.unwrap().chars().count(),
            TEXT_PREVIEW_CHARS
        );
    }

    #[test]
    fn test_negative_chunk_rejected() {
        let result = NewEmbeddingMetadata::new(
            Uuid::new_v4(),
            PointId::new(),
            EmbeddingKind::FullText,
            -1,
            Provenance::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_matches_text() {
        let request = NewEmbeddingMetadata::new(
            Uuid::new_v4(),
            PointId::new(),
            EmbeddingKind::Summary,
            0,
            Provenance::for_text("Led the platform team", None, "m", None),
        )
        .unwrap();
        let metadata = EmbeddingMetadata::new(request);

        assert!(metadata.matches_text("Led the platform team"));
        assert!(!metadata.matches_text("Led the data team"));
    }
}
