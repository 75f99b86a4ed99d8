pub mod align;
pub mod config;
pub mod engines;
pub mod error;
pub mod events;
pub mod format;
pub mod pipeline;
pub mod provider;
pub mod queues;
pub mod routes;
pub mod runtime;
pub mod service;
pub mod store;
pub mod types;
pub mod uploads;
pub mod workers;

pub use align::{DEFAULT_WINDOW_SECONDS, SegmentAligner, transcript_duration};
pub use config::Config;
pub use engines::{
    QuestionEngine, TranscriptionEngine, build_question_engine, build_transcription_engine,
};
pub use error::{MediaQuizError, Result};
pub use pipeline::{
    Orchestrator, PipelineSettings, QuestionPolicy, RecoveryAction, RecoveryReport,
    RecoverySettings, RetryPolicy, RunFailure, RunOutcome, RunSummary, Stage,
    recover_stale_files,
};
pub use provider::{Provider, ProviderEndpoint};
pub use runtime::{Dispatcher, PipelineRuntime};
pub use service::{MediaService, UploadRequest, delete_file_cascade};
pub use store::{JsonStore, MemoryStore, Store, open_store};
pub use types::{
    Difficulty, FileStatus, Fragment, GeneratedQuestion, MediaFile, NewQuestion, Question,
    QuestionOption, QuestionStats, QuestionUpdate, RawTranscript, Segment, SegmentList,
    Transcription, TranscriptionStatus,
};
pub use uploads::{UploadPolicy, UploadStore};
pub use workers::PipelineReport;
