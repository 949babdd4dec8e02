use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::application::ports::reconcile_queue::{
    QueueHealth, ReconcileJob, ReconcileQueue, ReconcileQueueError,
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct QueueStats {
    pending: usize,
    total_enqueued: u64,
    total_dequeued: u64,
    last_activity: Option<DateTime<Utc>>,
}

/// Sending half of the in-process reconcile queue.
pub struct MpscReconcileQueue {
    sender: mpsc::Sender<ReconcileJob>,
    stats: Arc<Mutex<QueueStats>>,
}

/// Receiving half, shared by the background workers.
pub struct MpscReconcileQueueReceiver {
    receiver: Mutex<mpsc::Receiver<ReconcileJob>>,
    stats: Arc<Mutex<QueueStats>>,
}

impl MpscReconcileQueue {
    pub fn create_pair(capacity: usize) -> (Self, MpscReconcileQueueReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(Mutex::new(QueueStats::default()));

        (
            Self {
                sender,
                stats: stats.clone(),
            },
            MpscReconcileQueueReceiver {
                receiver: Mutex::new(receiver),
                stats,
            },
        )
    }
}

#[async_trait]
impl ReconcileQueue for MpscReconcileQueue {
    async fn enqueue(&self, job: ReconcileJob) -> Result<(), ReconcileQueueError> {
        // Held across the send so a fast receiver cannot decrement first.
        let mut stats = self.stats.lock().await;
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ReconcileQueueError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ReconcileQueueError::Closed,
        })?;

        stats.pending += 1;
        stats.total_enqueued += 1;
        stats.last_activity = Some(Utc::now());
        Ok(())
    }

    async fn size(&self) -> Result<usize, ReconcileQueueError> {
        Ok(self.stats.lock().await.pending)
    }

    async fn health_check(&self) -> Result<QueueHealth, ReconcileQueueError> {
        let stats = self.stats.lock().await;

        Ok(QueueHealth {
            queue_size: stats.pending,
            total_enqueued: stats.total_enqueued,
            total_dequeued: stats.total_dequeued,
            is_healthy: !self.sender.is_closed(),
            last_activity: stats.last_activity,
        })
    }
}

impl MpscReconcileQueueReceiver {
    /// Waits for the next job; `None` once every sender is gone.
    pub async fn recv(&self) -> Option<ReconcileJob> {
        let job = {
            let mut receiver = self.receiver.lock().await;
            receiver.recv().await
        }?;

        let mut stats = self.stats.lock().await;
        stats.pending = stats.pending.saturating_sub(1);
        stats.total_dequeued += 1;
        stats.last_activity = Some(Utc::now());
        Some(job)
    }
}
