use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    events::{BusConfig, BusMetrics, EnrichedEvent, Event},
    routes::Routes,
};

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

struct EventBusInner {
    session_id: Uuid,
    next_ingest_seq: AtomicU64,
    routes: Routes,
    metrics: Arc<BusMetrics>,
}

impl EventBus {
    pub fn new(cfg: BusConfig, routes: Routes, metrics: Arc<BusMetrics>) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                session_id: cfg.session_id,
                next_ingest_seq: AtomicU64::new(0),
                routes,
                metrics,
            }),
        }
    }

    /// Deliver to every subscriber of the event's type. Never blocks.
    pub fn publish(&self, event: Arc<dyn Event>) {
        let ingest_seq = self.inner.next_ingest_seq.fetch_add(1, Ordering::Relaxed);
        let event_type = event.event_type();

        if tracing::enabled!(tracing::Level::TRACE) {
            let payload = serde_json::to_string(&*event).unwrap_or_default();
            tracing::trace!(event_type, ingest_seq, %payload, "publish");
        }

        let enriched_event = Arc::new(EnrichedEvent {
            event,
            session_id: self.inner.session_id,
            ingest_seq,
            ingested_at: Instant::now(),
        });

        let Some(routes) = self.inner.routes.table.get(event_type) else {
            self.inner.metrics.record_unrouted(event_type);
            tracing::warn!(event_type, "published event has no subscribers");
            return;
        };

        for route in routes {
            if route.inbox.deliver(Arc::clone(&enriched_event)) {
                self.inner.metrics.record_drop();
                tracing::warn!(
                    event_type,
                    subscriber = route.subscriber_id,
                    "queue full, dropped oldest event"
                );
            }
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.inner.metrics
    }
}
