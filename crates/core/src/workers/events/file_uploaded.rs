use std::{any::Any, time::SystemTime};

use serde::Serialize;
use uuid::Uuid;

use crate::events::{Event, EventHeader};

/// A stored file is ready for processing.
#[derive(Clone, Debug, Serialize)]
pub struct FileUploaded {
    pub header: EventHeader,
    pub file_id: Uuid,
}

impl FileUploaded {
    pub const EVENT_TYPE: &'static str = "file.uploaded";

    pub fn new(file_id: Uuid) -> Self {
        Self {
            header: EventHeader::root(),
            file_id,
        }
    }
}

impl Event for FileUploaded {
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
