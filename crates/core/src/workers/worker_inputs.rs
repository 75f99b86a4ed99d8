use std::sync::Arc;

use tokio::sync::Notify;

use crate::{
    events::EnrichedEvent,
    queues::{FifoDropOldestReceiver, UnboundedReceiver},
};

pub enum FifoReceiver {
    Unbounded(UnboundedReceiver<Arc<EnrichedEvent>>),
    FifoDropOldest(FifoDropOldestReceiver<Arc<EnrichedEvent>>),
}

impl FifoReceiver {
    fn try_recv(&self) -> Option<Arc<EnrichedEvent>> {
        match self {
            FifoReceiver::Unbounded(r) => r.try_recv(),
            FifoReceiver::FifoDropOldest(r) => r.try_recv(),
        }
    }
}

pub struct FifoInput {
    pub event_type: &'static str,
    pub receiver: FifoReceiver,
}

/// Every queue feeding one worker, sharing a single wakeup.
pub struct WorkerInputs {
    pub fifos: Vec<FifoInput>,
    pub notify_any: Arc<Notify>,
    pub fifo_index: usize,
}

pub struct InputItem {
    pub event_type: &'static str,
    pub event: Arc<EnrichedEvent>,
}

impl WorkerInputs {
    /// Next queued event, round-robin across inputs.
    pub async fn next(&mut self) -> InputItem {
        loop {
            if !self.fifos.is_empty() {
                for _ in 0..self.fifos.len() {
                    let i = self.fifo_index;
                    self.fifo_index = (self.fifo_index + 1) % self.fifos.len();
                    let fifo = &self.fifos[i];

                    if let Some(event) = fifo.receiver.try_recv() {
                        return InputItem {
                            event_type: fifo.event_type,
                            event,
                        };
                    }
                }
            }
            self.notify_any.notified().await;
        }
    }
}
