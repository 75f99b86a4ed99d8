use std::{any::Any, sync::Arc, time::SystemTime};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    events::{Event, EventHeader, downcast_ref},
    pipeline::RunFailure,
    workers::FileUploaded,
};

/// A run ended in failure, or a worker could not handle an event.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineFailed {
    pub header: EventHeader,
    pub file_id: Option<Uuid>,
    /// Pipeline stage, or the subscriber id for worker errors.
    pub stage: &'static str,
    pub message: String,
    pub status_recorded: bool,
}

impl PipelineFailed {
    pub const EVENT_TYPE: &'static str = "pipeline.failed";

    pub fn from_run(parent_event_id: Uuid, failure: &RunFailure) -> Self {
        Self {
            header: EventHeader::child_of(parent_event_id),
            file_id: Some(failure.file_id),
            stage: failure.stage.label(),
            message: failure.reason.clone(),
            status_recorded: failure.status_recorded,
        }
    }

    pub fn from_worker(parent: &Arc<dyn Event>, subscriber_id: &'static str, message: String) -> Self {
        Self {
            header: EventHeader::child_of(parent.event_id()),
            file_id: downcast_ref::<FileUploaded>(parent).map(|e| e.file_id),
            stage: subscriber_id,
            message,
            status_recorded: false,
        }
    }
}

impl Event for PipelineFailed {
    fn event_id(&self) -> Uuid {
        self.header.event_id
    }

    fn parent_ids(&self) -> &[Uuid] {
        &self.header.parent_ids
    }

    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    fn timestamp(&self) -> SystemTime {
        self.header.timestamp
    }

    fn as_any(&self) -> &dyn Any {
        self as &dyn Any
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_failure_keeps_file_id_and_fresh_event_id() {
        let uploaded = FileUploaded::new(Uuid::new_v4());
        let file_id = uploaded.file_id;
        let parent: Arc<dyn Event> = Arc::new(uploaded);

        let failed = PipelineFailed::from_worker(&parent, "pipeline.run", "boom".into());

        assert_eq!(failed.file_id, Some(file_id));
        assert_eq!(failed.parent_ids(), &[parent.event_id()]);
        assert_ne!(failed.event_id(), parent.event_id());
        assert_eq!(failed.event_type(), "pipeline.failed");
    }
}
