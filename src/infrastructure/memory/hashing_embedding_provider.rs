use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::application::ports::embedding_provider::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProvider, EmbeddingProviderError,
};

pub const HASHING_MODEL_NAME: &str = "sha256-hashing";

/// Deterministic embedder for tests and offline runs: the vector is derived
/// from the SHA-256 digest of the text, so equal texts get equal vectors.
pub struct HashingEmbeddingProvider {
    dimension: usize,
    failures_remaining: AtomicUsize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            failures_remaining: AtomicUsize::new(0),
        }
    }

    /// The next `count` calls fail with `ServiceUnavailable`.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut block = 0u32;
        while vector.len() < self.dimension {
            let digest = Sha256::new()
                .chain_update(block.to_le_bytes())
                .chain_update(text.as_bytes())
                .finalize();
            vector.extend(
                digest
                    .iter()
                    .take(self.dimension - vector.len())
                    .map(|byte| (*byte as f32 / 127.5) - 1.0),
            );
            block += 1;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn generate_embeddings(
        &self,
        request: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, EmbeddingProviderError> {
        if self.take_failure() {
            return Err(EmbeddingProviderError::ServiceUnavailable);
        }

        let total_tokens = request
            .texts
            .iter()
            .map(|text| text.split_whitespace().count() as i32)
            .sum();

        Ok(BatchEmbeddingResponse {
            embeddings: request.texts.iter().map(|text| self.embed(text)).collect(),
            model_name: HASHING_MODEL_NAME.to_string(),
            model_version: Some("1".to_string()),
            total_tokens: Some(total_tokens),
        })
    }

    async fn health_check(&self) -> Result<bool, EmbeddingProviderError> {
        Ok(true)
    }

    fn model_info(&self) -> (String, Option<String>) {
        (HASHING_MODEL_NAME.to_string(), Some("1".to_string()))
    }

    fn max_input_length(&self) -> usize {
        usize::MAX
    }
}
