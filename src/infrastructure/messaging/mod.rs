pub mod background_processor;
pub mod mpsc_reconcile_queue;
pub mod outbox_event_sink;

pub use background_processor::BackgroundProcessor;
pub use mpsc_reconcile_queue::{MpscReconcileQueue, MpscReconcileQueueReceiver};
pub use outbox_event_sink::OutboxEventSink;
