use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::application::ports::embedding_provider::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProvider, EmbeddingProviderError,
};

#[derive(Serialize)]
pub struct EmbeddingsRequest {
    pub text: TextInput,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextInput {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingsResponse {
    pub success: bool,
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsClientConfig {
    pub service_url: String,
    pub model_name: String,
    pub model_version: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub backoff_factor: f64,
}

impl Default for EmbeddingsClientConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8787".to_string(),
            model_name: "default".to_string(),
            model_version: None,
            max_retries: 2,
            timeout_secs: 30,
            backoff_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: Client,
    config: EmbeddingsClientConfig,
}

impl InferenceClient {
    pub fn new(config: EmbeddingsClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EmbeddingsClientConfig {
        &self.config
    }

    pub async fn get_embeddings(
        &self,
        texts: &[String],
    ) -> Result<EmbeddingsResponse, EmbeddingProviderError> {
        let request = EmbeddingsRequest {
            text: TextInput::Multiple(texts.to_vec()),
        };

        self.send_request(request).await
    }

    async fn send_request(
        &self,
        request: EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse, EmbeddingProviderError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.execute_request(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempts <= self.config.max_retries => {
                    let backoff_time = Duration::from_millis(
                        (self.config.backoff_factor.powi(attempts as i32 - 1) * 1000.0) as u64,
                    );
                    warn!(
                        attempt = attempts,
                        backoff_ms = backoff_time.as_millis() as u64,
                        error = %e,
                        "Embedding request failed, retrying"
                    );
                    tokio::time::sleep(backoff_time).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_request(
        &self,
        request: &EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse, EmbeddingProviderError> {
        let response = self
            .client
            .post(&self.config.service_url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| EmbeddingProviderError::NetworkError(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let data = response
            .json::<EmbeddingsResponse>()
            .await
            .map_err(|e| EmbeddingProviderError::ApiError(e.to_string()))?;

        if !data.success {
            return Err(EmbeddingProviderError::ApiError(
                "Embedding service reported failure".to_string(),
            ));
        }

        Ok(data)
    }
}

fn classify_status(status: StatusCode, body: String) -> EmbeddingProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => EmbeddingProviderError::RateLimitExceeded,
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            EmbeddingProviderError::ServiceUnavailable
        }
        s if s.is_client_error() => {
            EmbeddingProviderError::InvalidInput(format!("{}: {}", s, body))
        }
        s => EmbeddingProviderError::ApiError(format!("{}: {}", s, body)),
    }
}

/// Rough token estimate; the service does not report usage.
fn approximate_tokens(text: &str) -> i32 {
    text.split_whitespace().count() as i32
}

pub struct InferenceEmbeddingProvider {
    client: InferenceClient,
}

impl InferenceEmbeddingProvider {
    pub fn new(client: InferenceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EmbeddingProvider for InferenceEmbeddingProvider {
    async fn generate_embeddings(
        &self,
        request: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, EmbeddingProviderError> {
        if let Some(too_long) = request
            .texts
            .iter()
            .find(|text| text.chars().count() > self.max_input_length())
        {
            return Err(EmbeddingProviderError::InvalidInput(format!(
                "Input of {} chars exceeds the {} char limit",
                too_long.chars().count(),
                self.max_input_length()
            )));
        }

        let response = self.client.get_embeddings(&request.texts).await?;

        if response.embeddings.len() != request.texts.len() {
            return Err(EmbeddingProviderError::ApiError(format!(
                "Expected {} embeddings, got {}",
                request.texts.len(),
                response.embeddings.len()
            )));
        }

        let (model_name, model_version) = self.model_info();
        Ok(BatchEmbeddingResponse {
            embeddings: response.embeddings,
            model_name: request.model_name.unwrap_or(model_name),
            model_version: request.model_version.or(model_version),
            total_tokens: Some(request.texts.iter().map(|t| approximate_tokens(t)).sum()),
        })
    }

    async fn health_check(&self) -> Result<bool, EmbeddingProviderError> {
        match self.client.get_embeddings(&["health check".to_string()]).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    fn model_info(&self) -> (String, Option<String>) {
        let config = self.client.config();
        (config.model_name.clone(), config.model_version.clone())
    }

    fn max_input_length(&self) -> usize {
        8192
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_as_plain_list() {
        let request = EmbeddingsRequest {
            text: TextInput::Multiple(vec!["Hello".to_string(), "World".to_string()]),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"text": ["Hello", "World"]}));
    }

    #[test]
    fn test_response_parses_float_vectors() {
        let body = r#"{"success":true,"input_text":["a"],"embeddings":[[0.1,0.2,0.3]],"shape":[1,3]}"#;
        let response: EmbeddingsResponse = serde_json::from_str(body).unwrap();

        assert!(response.success);
        assert_eq!(response.embeddings[0].len(), 3);
        assert_eq!(response.shape, vec![1, 3]);
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            EmbeddingProviderError::RateLimitExceeded
        ));
        assert!(!classify_status(StatusCode::BAD_REQUEST, "bad".to_string()).is_retryable());
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()).is_retryable());
    }
}
