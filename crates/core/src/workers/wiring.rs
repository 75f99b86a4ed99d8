use std::collections::HashMap;

use anyhow::{anyhow, bail};

use crate::{queues::QueueKind, workers::WorkerInputs};

/// What one worker listens to, registered with the bus builder.
pub struct SubscriptionSpec {
    pub subscriber_id: &'static str,
    pub inputs: Vec<InputSpec>,
}

pub struct InputSpec {
    pub event_type: &'static str,
    pub queue_kind: QueueKind,
}

/// Receiving ends produced by the builder, handed out once per worker.
pub struct WorkerWiring {
    by_subscriber: HashMap<&'static str, WorkerInputs>,
}

impl WorkerWiring {
    pub(crate) fn new(by_subscriber: HashMap<&'static str, WorkerInputs>) -> Self {
        Self { by_subscriber }
    }

    pub fn take(&mut self, subscriber_id: &'static str) -> Option<WorkerInputs> {
        self.by_subscriber.remove(subscriber_id)
    }

    pub fn require(&mut self, subscriber_id: &'static str) -> anyhow::Result<WorkerInputs> {
        self.take(subscriber_id)
            .ok_or_else(|| anyhow!("no wiring for subscriber_id={subscriber_id}"))
    }

    /// Fails if a subscriber was registered but never given a worker; its
    /// queues would fill up with nobody draining them.
    pub fn finish(self) -> anyhow::Result<()> {
        if self.by_subscriber.is_empty() {
            return Ok(());
        }
        let mut unclaimed: Vec<_> = self.by_subscriber.into_keys().collect();
        unclaimed.sort_unstable();
        bail!("subscribers without a worker: {}", unclaimed.join(", "))
    }
}
