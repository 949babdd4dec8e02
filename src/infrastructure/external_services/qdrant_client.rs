use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::application::ports::vector_index::{
    PointInventory, PointPage, VectorIndex, VectorIndexError, VectorPoint,
};
use crate::domain::value_objects::PointId;

const API_KEY_HEADER: &str = "api-key";

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub base_url: Url,
    pub collection: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Vector index backed by the Qdrant REST API.
#[derive(Debug, Clone)]
pub struct QdrantVectorIndex {
    client: Client,
    config: QdrantConfig,
}

#[derive(Debug, Serialize)]
struct UpsertBody<'a> {
    points: [&'a VectorPoint; 1],
}

#[derive(Debug, Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScrolledPoint>,
    next_page_offset: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ScrolledPoint {
    id: serde_json::Value,
}

impl QdrantVectorIndex {
    pub fn new(config: QdrantConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url, VectorIndexError> {
        collection_url(&self.config.base_url, &self.config.collection, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, VectorIndexError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| VectorIndexError::Unavailable(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, body))
    }
}

pub fn collection_url(base: &Url, collection: &str, path: &str) -> Result<Url, VectorIndexError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    base.join(&format!("collections/{}{}", collection, path))
        .map_err(|e| VectorIndexError::Rejected(format!("Invalid Qdrant url: {}", e)))
}

fn classify_status(status: StatusCode, body: String) -> VectorIndexError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        VectorIndexError::Unavailable(format!("{}: {}", status, body))
    } else {
        VectorIndexError::Rejected(format!("{}: {}", status, body))
    }
}

fn parse_point_id(value: &serde_json::Value) -> Option<PointId> {
    value
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .map(PointId::from_uuid)
}

fn into_page(result: ScrollResult) -> PointPage {
    let mut point_ids = Vec::with_capacity(result.points.len());
    for point in &result.points {
        match parse_point_id(&point.id) {
            Some(id) => point_ids.push(id),
            // Numeric ids are never written by the registry.
            None => warn!(point_id = %point.id, "Skipping point with a non-uuid id"),
        }
    }

    PointPage {
        point_ids,
        next_offset: result.next_page_offset.as_ref().and_then(parse_point_id),
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, point: VectorPoint) -> Result<(), VectorIndexError> {
        if point.vector.is_empty() {
            return Err(VectorIndexError::Rejected("empty vector".to_string()));
        }

        let url = self.endpoint("/points?wait=true")?;
        self.send(self.client.put(url).json(&UpsertBody { points: [&point] }))
            .await?;

        debug!(point_id = %point.id, "Point upserted");
        Ok(())
    }

    async fn delete(&self, point_id: PointId) -> Result<(), VectorIndexError> {
        let url = self.endpoint("/points/delete?wait=true")?;
        self.send(self.client.post(url).json(&json!({ "points": [point_id] })))
            .await?;

        debug!(point_id = %point_id, "Point deleted");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, VectorIndexError> {
        let url = self.endpoint("")?;
        match self.send(self.client.get(url)).await {
            Ok(_) => Ok(true),
            Err(VectorIndexError::Rejected(_)) => Ok(false),
            Err(VectorIndexError::Unavailable(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn inventory(&self) -> Option<&dyn PointInventory> {
        Some(self)
    }
}

#[async_trait]
impl PointInventory for QdrantVectorIndex {
    async fn scroll_point_ids(
        &self,
        offset: Option<PointId>,
        limit: usize,
    ) -> Result<PointPage, VectorIndexError> {
        let url = self.endpoint("/points/scroll")?;
        let body = json!({
            "limit": limit,
            "offset": offset,
            "with_payload": false,
            "with_vector": false,
        });

        let response = self.send(self.client.post(url).json(&body)).await?;
        let parsed = response
            .json::<ScrollResponse>()
            .await
            .map_err(|e| VectorIndexError::InvalidResponse(e.to_string()))?;

        Ok(into_page(parsed.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_url_keeps_base_path() {
        let base = Url::parse("https://qdrant.internal/proxy").unwrap();
        let url = collection_url(&base, "resume", "/points/scroll").unwrap();
        assert_eq!(
            url.as_str(),
            "https://qdrant.internal/proxy/collections/resume/points/scroll"
        );

        let bare = Url::parse("http://localhost:6333").unwrap();
        let url = collection_url(&bare, "resume", "/points?wait=true").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:6333/collections/resume/points?wait=true"
        );
    }

    #[test]
    fn test_scroll_page_skips_foreign_ids() {
        let own = PointId::new();
        let next = PointId::new();
        let body = json!({
            "result": {
                "points": [{"id": own.to_string()}, {"id": 42}],
                "next_page_offset": next.to_string(),
            },
            "status": "ok",
            "time": 0.001,
        });

        let parsed: ScrollResponse = serde_json::from_value(body).unwrap();
        let page = into_page(parsed.result);

        assert_eq!(page.point_ids, vec![own]);
        assert_eq!(page.next_offset, Some(next));
    }

    #[test]
    fn test_upsert_body_shape() {
        let point = VectorPoint {
            id: PointId::new(),
            vector: vec![0.25, 0.5],
            payload: json!({"embedding_kind": "full_text"}),
        };

        let body = serde_json::to_value(UpsertBody { points: [&point] }).unwrap();
        assert_eq!(body["points"][0]["id"], json!(point.id.to_string()));
        assert_eq!(body["points"][0]["vector"], json!([0.25, 0.5]));
    }

    #[test]
    fn test_throttling_is_retryable() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_retryable());
        assert!(!classify_status(StatusCode::NOT_FOUND, String::new()).is_retryable());
    }
}
