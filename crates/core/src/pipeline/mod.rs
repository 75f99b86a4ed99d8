//! Per-file processing: transcribe, align, generate questions, finalize.

pub mod orchestrator;
pub mod recovery;

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::align::DEFAULT_WINDOW_SECONDS;

pub use orchestrator::Orchestrator;
pub use recovery::{RecoveryAction, RecoveryReport, RecoverySettings, recover_stale_files};

/// What a question-generation failure means for the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPolicy {
    /// Failures are logged and the file still completes.
    #[default]
    BestEffort,
    /// Any failed window fails the file.
    Required,
}

/// Bounded retry around engine calls. One attempt means fail-fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (1-based), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub window_seconds: f64,
    pub generate_questions: bool,
    pub question_policy: QuestionPolicy,
    pub engine_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_WINDOW_SECONDS,
            generate_questions: true,
            question_policy: QuestionPolicy::BestEffort,
            engine_timeout: Duration::from_secs(600),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    MarkProcessing,
    Transcribe,
    PersistTranscription,
    GenerateQuestions,
    Finalize,
    /// The run task died without returning an outcome.
    Aborted,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::MarkProcessing => "mark_processing",
            Stage::Transcribe => "transcribe",
            Stage::PersistTranscription => "persist_transcription",
            Stage::GenerateQuestions => "generate_questions",
            Stage::Finalize => "finalize",
            Stage::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub file_id: Uuid,
    pub transcription_id: Uuid,
    pub segments: usize,
    pub questions: usize,
    /// Windows whose question generation failed.
    pub failed_segments: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub file_id: Uuid,
    pub stage: Stage,
    pub reason: String,
    /// False when even the `failed` status write did not land.
    pub status_recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunOutcome {
    Completed(RunSummary),
    Failed(RunFailure),
}

impl RunOutcome {
    pub fn file_id(&self) -> Uuid {
        match self {
            RunOutcome::Completed(summary) => summary.file_id,
            RunOutcome::Failed(failure) => failure.file_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}
