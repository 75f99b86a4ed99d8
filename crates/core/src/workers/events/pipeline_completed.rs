use std::{any::Any, time::SystemTime};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    events::{Event, EventHeader},
    pipeline::RunSummary,
};

#[derive(Clone, Debug, Serialize)]
pub struct PipelineCompleted {
    pub header: EventHeader,
    pub summary: RunSummary,
}

impl PipelineCompleted {
    pub const EVENT_TYPE: &'static str = "pipeline.completed";

    pub fn new(parent_event_id: Uuid, summary: RunSummary) -> Self {
        Self {
            header: EventHeader::child_of(parent_event_id),
            summary,
        }
    }
}

impl Event for PipelineCompleted {
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
