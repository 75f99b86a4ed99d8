use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    events::{BusConfig, EventBus, EventBusBuilder},
    pipeline::Orchestrator,
    workers::{
        FileUploaded, PipelineReport, PipelineReportSink, RunPipelineWorker, RunPool, Worker,
    },
};

/// Submits files to the pipeline without waiting for them.
#[derive(Clone)]
pub struct Dispatcher {
    bus: Arc<EventBus>,
}

impl Dispatcher {
    pub fn submit(&self, file_id: Uuid) {
        tracing::debug!(file_id = %file_id, "submitting file to pipeline");
        self.bus.publish(Arc::new(FileUploaded::new(file_id)));
    }
}

/// The running bus and its workers.
pub struct PipelineRuntime {
    bus: Arc<EventBus>,
    shutdown_tx: broadcast::Sender<()>,
    pool: Arc<RunPool>,
    workers: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl PipelineRuntime {
    /// Must be called from within a tokio runtime.
    pub fn start(orchestrator: Arc<Orchestrator>, max_concurrent: usize) -> anyhow::Result<Self> {
        Self::start_with_observer(orchestrator, max_concurrent, None)
    }

    /// Like `start`, also forwarding every pipeline outcome to the returned
    /// receiver.
    pub fn start_observed(
        orchestrator: Arc<Orchestrator>,
        max_concurrent: usize,
    ) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<PipelineReport>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = Self::start_with_observer(orchestrator, max_concurrent, Some(tx))?;
        Ok((runtime, rx))
    }

    fn start_with_observer(
        orchestrator: Arc<Orchestrator>,
        max_concurrent: usize,
        observer: Option<mpsc::UnboundedSender<PipelineReport>>,
    ) -> anyhow::Result<Self> {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

        let (bus, mut wiring) = EventBusBuilder::new(BusConfig::default())
            .subscribe(RunPipelineWorker::subscription())
            .subscribe(PipelineReportSink::subscription())
            .build()?;
        let bus = Arc::new(bus);

        let pool = Arc::new(RunPool::new(max_concurrent));
        let run_worker = RunPipelineWorker::new(orchestrator, Arc::clone(&pool));
        let report_sink = PipelineReportSink::new(observer);

        let run_inputs = wiring.require(RunPipelineWorker::SUBSCRIBER_ID)?;
        let report_inputs = wiring.require(PipelineReportSink::SUBSCRIBER_ID)?;
        wiring.finish()?;

        let workers = vec![
            tokio::spawn(run_worker.run(run_inputs, Arc::clone(&bus), shutdown_rx.resubscribe())),
            tokio::spawn(report_sink.run(
                report_inputs,
                Arc::clone(&bus),
                shutdown_rx.resubscribe(),
            )),
        ];

        tracing::info!(
            session_id = %bus.session_id(),
            max_concurrent,
            "pipeline runtime started"
        );

        Ok(Self {
            bus,
            shutdown_tx,
            pool,
            workers,
        })
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            bus: Arc::clone(&self.bus),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Stop the workers and wait up to `grace` for running files. Files that
    /// never started stay `uploaded` and are picked up by recovery on the
    /// next start.
    pub async fn shutdown(self, grace: Duration) -> bool {
        let drained = self.pool.drain(grace).await;
        if !drained {
            tracing::warn!(
                in_flight = self.pool.in_flight(),
                "pipeline runs still active after {grace:?}"
            );
        }

        let _ = self.shutdown_tx.send(());
        for worker in self.workers {
            match worker.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("worker exited with error: {e:#}"),
                Err(e) => tracing::error!("worker task panicked: {e}"),
            }
        }

        tracing::info!("pipeline runtime stopped");
        drained
    }
}
