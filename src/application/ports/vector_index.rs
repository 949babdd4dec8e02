use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::value_objects::PointId;

#[derive(Debug, Clone, Error)]
pub enum VectorIndexError {
    #[error("Vector index unavailable: {0}")]
    Unavailable(String),
    #[error("Vector index rejected the request: {0}")]
    Rejected(String),
    #[error("Unexpected vector index response: {0}")]
    InvalidResponse(String),
}

impl VectorIndexError {
    /// Rejections are caused by the request itself and will not succeed on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, VectorIndexError::Rejected(_))
    }
}

/// A vector and its payload. The vector is opaque to the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorPoint {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointPage {
    pub point_ids: Vec<PointId>,
    pub next_offset: Option<PointId>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite one point.
    async fn upsert(&self, point: VectorPoint) -> Result<(), VectorIndexError>;

    /// Deleting an unknown point succeeds.
    async fn delete(&self, point_id: PointId) -> Result<(), VectorIndexError>;

    async fn health_check(&self) -> Result<bool, VectorIndexError>;

    /// Enumeration support, needed only by the reconciliation sweep.
    fn inventory(&self) -> Option<&dyn PointInventory> {
        None
    }
}

#[async_trait]
pub trait PointInventory: Send + Sync {
    async fn scroll_point_ids(
        &self,
        offset: Option<PointId>,
        limit: usize,
    ) -> Result<PointPage, VectorIndexError>;
}
