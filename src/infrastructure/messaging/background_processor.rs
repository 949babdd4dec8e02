use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::application::ports::reconcile_queue::ReconcileJob;
use crate::application::services::{ReconciliationSweep, Reconciler};
use crate::infrastructure::messaging::MpscReconcileQueueReceiver;

/// Pool of tokio workers draining the reconcile queue, plus an optional
/// timer that runs the reconciliation sweep.
#[derive(Clone)]
pub struct BackgroundProcessor {
    job_receiver: Arc<MpscReconcileQueueReceiver>,
    reconciler: Arc<Reconciler>,
    sweep: Arc<ReconciliationSweep>,
    sweep_guard: Arc<Mutex<()>>,
    worker_count: usize,
    sweep_interval: Option<Duration>,
}

impl BackgroundProcessor {
    pub fn new(
        job_receiver: Arc<MpscReconcileQueueReceiver>,
        reconciler: Arc<Reconciler>,
        sweep: Arc<ReconciliationSweep>,
    ) -> Self {
        Self {
            job_receiver,
            reconciler,
            sweep,
            sweep_guard: Arc::new(Mutex::new(())),
            worker_count: 3,
            sweep_interval: None,
        }
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval.filter(|i| !i.is_zero());
        self
    }

    /// Runs until every queue sender is dropped.
    pub async fn start(&self) {
        info!(
            workers = self.worker_count,
            sweep_interval_secs = self.sweep_interval.map(|i| i.as_secs()),
            "Starting background processor"
        );

        let ticker = self.sweep_interval.map(|interval| {
            let processor = self.clone();
            tokio::spawn(async move { processor.sweep_loop(interval).await })
        });

        let mut handles = Vec::new();
        for worker_id in 0..self.worker_count {
            let processor = self.clone();
            handles.push(tokio::spawn(async move {
                processor.worker_loop(worker_id).await;
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker_id = i, error = %e, "Worker panicked");
            }
        }

        if let Some(ticker) = ticker {
            ticker.abort();
        }

        info!("Background processor stopped");
    }

    async fn worker_loop(&self, worker_id: usize) {
        debug!(worker_id, "Worker started");

        while let Some(job) = self.job_receiver.recv().await {
            debug!(worker_id, ?job, "Processing reconcile job");
            self.process_job(job).await;
        }

        debug!(worker_id, "Worker stopped, queue closed");
    }

    async fn sweep_loop(&self, interval: Duration) {
        let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            self.run_sweep().await;
        }
    }

    async fn process_job(&self, job: ReconcileJob) {
        match job {
            ReconcileJob::Sweep => self.run_sweep().await,
            job => {
                if let Err(e) = self.reconciler.run_job(job).await {
                    error!(?job, error = %e, code = e.code(), "Reconcile job failed");
                }
            }
        }
    }

    async fn run_sweep(&self) {
        let Ok(_running) = self.sweep_guard.try_lock() else {
            warn!("Sweep already running, skipping");
            return;
        };

        match self.sweep.run().await {
            Ok(report) => info!(
                orphans = report.orphans.len(),
                points_deleted = report.points_deleted,
                metadata_invalidated = report.metadata_invalidated,
                entities_reconciled = report.entities_reconciled,
                entities_failed = report.entities_failed,
                deletions_failed = report.deletions.failed.len(),
                "Reconciliation sweep finished"
            ),
            Err(e) => error!(error = %e, code = e.code(), "Reconciliation sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::reconcile_queue::ReconcileQueue;
    use crate::application::services::{ReconcilerSettings, RetryPolicy};
    use crate::domain::entities::EntityVariant;
    use crate::domain::entities::variants::Skill;
    use crate::domain::repositories::{EmbeddingMetadataRepository, EntityRepository};
    use crate::infrastructure::memory::{
        HashingEmbeddingProvider, InMemoryEventSink, InMemoryRegistry, InMemoryVectorIndex,
    };
    use crate::infrastructure::messaging::MpscReconcileQueue;

    struct Fixture {
        registry: Arc<InMemoryRegistry>,
        index: Arc<InMemoryVectorIndex>,
        queue: MpscReconcileQueue,
        processor: BackgroundProcessor,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(InMemoryRegistry::new());
        let index = Arc::new(InMemoryVectorIndex::new());
        let reconciler = Arc::new(Reconciler::new(
            registry.clone(),
            registry.clone(),
            registry.clone(),
            registry.clone(),
            index.clone(),
            Arc::new(HashingEmbeddingProvider::new(8)),
            Arc::new(InMemoryEventSink::new()),
            ReconcilerSettings {
                retry: RetryPolicy::no_retry(Duration::from_millis(200)),
                ..ReconcilerSettings::default()
            },
        ));
        let sweep = Arc::new(ReconciliationSweep::new(
            registry.clone(),
            registry.clone(),
            registry.clone(),
            index.clone(),
            reconciler.clone(),
        ));
        let (queue, receiver) = MpscReconcileQueue::create_pair(16);
        let processor = BackgroundProcessor::new(Arc::new(receiver), reconciler, sweep)
            .with_worker_count(2);

        Fixture {
            registry,
            index,
            queue,
            processor,
        }
    }

    fn skill() -> EntityVariant {
        EntityVariant::Skill(Skill {
            profile_id: 1,
            category: Some("Languages".to_string()),
            name: Some("Rust".to_string()),
            proficiency: Some("Expert".to_string()),
        })
    }

    #[tokio::test]
    async fn test_workers_drain_queue_then_stop() {
        let f = fixture();
        let entity = f.registry.create(&skill()).await.unwrap();

        f.queue
            .enqueue(ReconcileJob::Embed {
                entity_uuid: entity.uuid(),
            })
            .await
            .unwrap();
        drop(f.queue);

        tokio::time::timeout(Duration::from_secs(5), f.processor.start())
            .await
            .unwrap();

        assert!(f.registry.count().await.unwrap() > 0);
        assert_eq!(f.index.len() as i64, f.registry.count().await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_job_deletes_queued_points() {
        let f = fixture();
        let entity = f.registry.create(&skill()).await.unwrap();
        f.processor
            .process_job(ReconcileJob::Embed {
                entity_uuid: entity.uuid(),
            })
            .await;
        let points = f.index.len();
        assert!(points > 0);

        f.registry.delete(entity.uuid()).await.unwrap();
        f.processor
            .process_job(ReconcileJob::PurgePoints {
                entity_uuid: Some(entity.uuid()),
            })
            .await;

        assert!(f.index.is_empty());
    }

    #[test]
    fn test_sweep_interval_zero_disables_timer() {
        let f = fixture();
        let processor = f.processor.with_sweep_interval(Some(Duration::ZERO));
        assert!(processor.sweep_interval.is_none());
    }
}
