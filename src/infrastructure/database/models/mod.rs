pub mod embedding_model;
pub mod entity_model;
pub mod outbox_model;
pub mod sync_state_model;
pub mod variant_models;

pub use embedding_model::*;
pub use entity_model::*;
pub use outbox_model::*;
pub use sync_state_model::*;
pub use variant_models::*;
