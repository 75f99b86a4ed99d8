use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::{
    events::{EnrichedEvent, EventBus, expect},
    pipeline::{Orchestrator, RunOutcome},
    queues::QueueKind,
    workers::{
        FileUploaded, InputSpec, PipelineCompleted, PipelineFailed, SubscriptionSpec, Worker,
    },
};

/// Bounded set of concurrent runs, keyed by file id.
pub struct RunPool {
    permits: Arc<Semaphore>,
    size: u32,
    in_flight: Mutex<HashSet<Uuid>>,
    draining: AtomicBool,
}

impl RunPool {
    pub fn new(max_concurrent: usize) -> Self {
        let size = u32::try_from(max_concurrent.max(1)).unwrap_or(u32::MAX);
        Self {
            permits: Arc::new(Semaphore::new(size as usize)),
            size,
            in_flight: Mutex::new(HashSet::new()),
            draining: AtomicBool::new(false),
        }
    }

    /// False if the file is already queued or running.
    fn claim(&self, file_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .expect("RunPool poisoned")
            .insert(file_id)
    }

    fn release(&self, file_id: Uuid) {
        self.in_flight
            .lock()
            .expect("RunPool poisoned")
            .remove(&file_id);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().expect("RunPool poisoned").len()
    }

    /// Stop starting queued runs and wait for running ones, up to `grace`.
    /// Returns true if everything finished in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.draining.store(true, Ordering::SeqCst);
        matches!(
            tokio::time::timeout(grace, self.permits.acquire_many(self.size)).await,
            Ok(Ok(_))
        )
    }
}

/// Runs the orchestrator for every uploaded file.
pub struct RunPipelineWorker {
    orchestrator: Arc<Orchestrator>,
    pool: Arc<RunPool>,
}

impl RunPipelineWorker {
    pub fn new(orchestrator: Arc<Orchestrator>, pool: Arc<RunPool>) -> Self {
        Self { orchestrator, pool }
    }
}

impl Worker for RunPipelineWorker {
    const SUBSCRIBER_ID: &'static str = "pipeline.run";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec {
                event_type: FileUploaded::EVENT_TYPE,
                queue_kind: QueueKind::Unbounded,
            }],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<FileUploaded>(&event.event, FileUploaded::EVENT_TYPE)?;
        let file_id = req.file_id;
        let parent_id = event.event.event_id();

        if !self.pool.claim(file_id) {
            tracing::warn!(file_id = %file_id, "file already in flight, ignoring duplicate submission");
            return Ok(());
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let pool = Arc::clone(&self.pool);
        let bus = bus.clone();

        tokio::spawn(async move {
            let Ok(_permit) = Arc::clone(&pool.permits).acquire_owned().await else {
                pool.release(file_id);
                return;
            };
            if pool.draining.load(Ordering::SeqCst) {
                tracing::info!(file_id = %file_id, "shutting down, leaving queued file for recovery");
                pool.release(file_id);
                return;
            }

            let run = tokio::spawn({
                let orchestrator = Arc::clone(&orchestrator);
                async move { orchestrator.run(file_id).await }
            });
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let reason = if e.is_panic() {
                        "pipeline task panicked".to_string()
                    } else {
                        format!("pipeline task stopped: {e}")
                    };
                    RunOutcome::Failed(orchestrator.record_abort(file_id, reason).await)
                }
            };
            pool.release(file_id);

            match outcome {
                RunOutcome::Completed(summary) => {
                    bus.publish(Arc::new(PipelineCompleted::new(parent_id, summary)));
                }
                RunOutcome::Failed(failure) => {
                    bus.publish(Arc::new(PipelineFailed::from_run(parent_id, &failure)));
                }
            }
        });

        Ok(())
    }
}
