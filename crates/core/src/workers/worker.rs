use std::{future::Future, sync::Arc};

use anyhow::Result;
use tokio::sync::broadcast;

use crate::{
    events::{EnrichedEvent, EventBus},
    workers::{PipelineFailed, SubscriptionSpec, WorkerInputs},
};

pub trait Worker: Send + Sized + 'static {
    const SUBSCRIBER_ID: &'static str;

    fn subscription() -> SubscriptionSpec;

    fn handle(
        &mut self,
        event: Arc<EnrichedEvent>,
        bus: &EventBus,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Consume inputs until shutdown. Handler errors become `PipelineFailed`.
    fn run(
        mut self,
        mut inputs: WorkerInputs,
        bus: Arc<EventBus>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => return Ok(()),
                    item = inputs.next() => {
                        let parent = Arc::clone(&item.event.event);
                        if let Err(e) = self.handle(item.event, &bus).await {
                            tracing::error!(
                                subscriber = Self::SUBSCRIBER_ID,
                                event_type = item.event_type,
                                "worker failed: {e:#}"
                            );
                            bus.publish(Arc::new(PipelineFailed::from_worker(
                                &parent,
                                Self::SUBSCRIBER_ID,
                                format!("{e:#}"),
                            )));
                        }
                    }
                }
            }
        }
    }
}
