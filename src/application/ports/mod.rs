pub mod embedding_provider;
pub mod event_sink;
pub mod reconcile_queue;
pub mod vector_index;

pub use embedding_provider::EmbeddingProvider;
pub use event_sink::{ReconcileEventSink, SyncTransition};
pub use reconcile_queue::{ReconcileJob, ReconcileQueue};
pub use vector_index::{PointInventory, VectorIndex, VectorPoint};
