pub mod hashing_embedding_provider;
pub mod in_memory_event_sink;
pub mod in_memory_registry;
pub mod in_memory_vector_index;

pub use hashing_embedding_provider::HashingEmbeddingProvider;
pub use in_memory_event_sink::InMemoryEventSink;
pub use in_memory_registry::InMemoryRegistry;
pub use in_memory_vector_index::InMemoryVectorIndex;
