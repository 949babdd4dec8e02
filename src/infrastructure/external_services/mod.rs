pub mod inference_client;
pub mod qdrant_client;

pub use inference_client::{EmbeddingsClientConfig, InferenceClient, InferenceEmbeddingProvider};
pub use qdrant_client::{QdrantConfig, QdrantVectorIndex};
