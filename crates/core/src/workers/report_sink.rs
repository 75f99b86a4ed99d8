use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    events::{EnrichedEvent, EventBus, downcast_ref},
    pipeline::RunSummary,
    queues::QueueKind,
    workers::{InputSpec, PipelineCompleted, PipelineFailed, SubscriptionSpec, Worker},
};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineReport {
    Completed(RunSummary),
    Failed {
        file_id: Option<Uuid>,
        stage: &'static str,
        message: String,
    },
}

impl PipelineReport {
    pub fn file_id(&self) -> Option<Uuid> {
        match self {
            PipelineReport::Completed(summary) => Some(summary.file_id),
            PipelineReport::Failed { file_id, .. } => *file_id,
        }
    }
}

/// The single place where pipeline outcomes end up.
pub struct PipelineReportSink {
    observer: Option<mpsc::UnboundedSender<PipelineReport>>,
}

impl PipelineReportSink {
    pub fn new(observer: Option<mpsc::UnboundedSender<PipelineReport>>) -> Self {
        Self { observer }
    }

    fn forward(&mut self, report: PipelineReport) {
        if let Some(observer) = &self.observer {
            if observer.send(report).is_err() {
                self.observer = None;
            }
        }
    }
}

impl Worker for PipelineReportSink {
    const SUBSCRIBER_ID: &'static str = "pipeline.report_sink";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![
                InputSpec {
                    event_type: PipelineCompleted::EVENT_TYPE,
                    queue_kind: QueueKind::FifoDropOldest { capacity: 256 },
                },
                InputSpec {
                    event_type: PipelineFailed::EVENT_TYPE,
                    queue_kind: QueueKind::FifoDropOldest { capacity: 256 },
                },
            ],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> anyhow::Result<()> {
        if let Some(done) = downcast_ref::<PipelineCompleted>(&event.event) {
            let s = &done.summary;
            tracing::info!(
                file_id = %s.file_id,
                transcription_id = %s.transcription_id,
                segments = s.segments,
                questions = s.questions,
                "file processed"
            );
            if !s.failed_segments.is_empty() {
                tracing::warn!(
                    file_id = %s.file_id,
                    failed_segments = ?s.failed_segments,
                    "some segments have no questions"
                );
            }
            self.forward(PipelineReport::Completed(s.clone()));
        }

        if let Some(failed) = downcast_ref::<PipelineFailed>(&event.event) {
            let file_id = failed
                .file_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            if failed.status_recorded {
                tracing::error!(file_id, stage = failed.stage, "file failed: {}", failed.message);
            } else {
                tracing::error!(
                    file_id,
                    stage = failed.stage,
                    "file failed and its status could not be recorded: {}",
                    failed.message
                );
            }
            self.forward(PipelineReport::Failed {
                file_id: failed.file_id,
                stage: failed.stage,
                message: failed.message.clone(),
            });
        }

        Ok(())
    }
}
