pub mod chunking;
pub mod entity_service;
pub mod errors;
pub mod event_sinks;
pub mod reconciler;
pub mod retry;
pub mod sweep;

pub use entity_service::EntityService;
pub use errors::RegistryError;
pub use event_sinks::{FanoutEventSink, TracingEventSink};
pub use reconciler::{ReconcileOutcome, Reconciler, ReconcilerSettings};
pub use retry::RetryPolicy;
pub use sweep::{ReconciliationSweep, SweepReport, SweepSettings};
