use std::{future::Future, sync::Arc};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    align::{SegmentAligner, transcript_duration},
    engines::{QuestionEngine, TranscriptionEngine},
    error::{MediaQuizError, Result},
    format::format_window,
    pipeline::{PipelineSettings, QuestionPolicy, RunFailure, RunOutcome, RunSummary, Stage},
    store::Store,
    types::{
        FileStatus, GeneratedQuestion, MediaFile, Question, Segment, Transcription,
        TranscriptionStatus,
    },
};

struct StageError {
    stage: Stage,
    error: MediaQuizError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

struct QuestionTally {
    persisted: usize,
    failed_segments: Vec<u32>,
}

/// Drives one file from `uploaded` to `completed` or `failed`.
///
/// Callers must not run the same file twice concurrently.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    transcriber: Arc<dyn TranscriptionEngine>,
    questions: Arc<dyn QuestionEngine>,
    aligner: SegmentAligner,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        transcriber: Arc<dyn TranscriptionEngine>,
        questions: Arc<dyn QuestionEngine>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let aligner = SegmentAligner::new(settings.window_seconds)?;
        Ok(Self {
            store,
            transcriber,
            questions,
            aligner,
            settings,
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the whole pipeline for one file. Never returns an error: every
    /// failure is logged and reflected in the file's status.
    pub async fn run(&self, file_id: Uuid) -> RunOutcome {
        tracing::info!(
            file_id = %file_id,
            transcriber = self.transcriber.name(),
            questions = self.questions.name(),
            "pipeline started"
        );

        let mut written = None;
        match self.execute(file_id, &mut written).await {
            Ok(summary) => {
                tracing::info!(
                    file_id = %file_id,
                    transcription_id = %summary.transcription_id,
                    segments = summary.segments,
                    questions = summary.questions,
                    failed_segments = summary.failed_segments.len(),
                    "pipeline completed"
                );
                RunOutcome::Completed(summary)
            }
            Err(StageError { stage, error }) => {
                tracing::error!(file_id = %file_id, stage = %stage, "pipeline failed: {error}");

                let status_recorded = if stage == Stage::Load && error.is_not_found() {
                    false
                } else {
                    self.record_failure(file_id, written).await
                };

                RunOutcome::Failed(RunFailure {
                    file_id,
                    stage,
                    reason: error.to_string(),
                    status_recorded,
                })
            }
        }
    }

    /// `written` is set as soon as this run has persisted a transcription.
    async fn execute(
        &self,
        file_id: Uuid,
        written: &mut Option<Uuid>,
    ) -> std::result::Result<RunSummary, StageError> {
        let file = self.store.get_file(file_id).await.at(Stage::Load)?;

        let file = self
            .store
            .set_file_status(file.id, FileStatus::Processing)
            .await
            .at(Stage::MarkProcessing)?;

        let transcription = self.transcribe(&file).await?;
        *written = Some(transcription.id);
        let segments = transcription.segments.len();

        let tally = if self.settings.generate_questions {
            self.generate_questions(&transcription).await?
        } else {
            QuestionTally {
                persisted: 0,
                failed_segments: Vec::new(),
            }
        };

        if self.settings.question_policy == QuestionPolicy::Required
            && !tally.failed_segments.is_empty()
        {
            return Err(StageError {
                stage: Stage::GenerateQuestions,
                error: MediaQuizError::QuestionGenerationFailed {
                    reason: format!(
                        "no questions for segments {:?}",
                        tally.failed_segments
                    ),
                },
            });
        }

        self.store
            .set_file_status(file.id, FileStatus::Completed)
            .await
            .at(Stage::Finalize)?;

        Ok(RunSummary {
            file_id,
            transcription_id: transcription.id,
            segments,
            questions: tally.persisted,
            failed_segments: tally.failed_segments,
        })
    }

    async fn transcribe(&self, file: &MediaFile) -> std::result::Result<Transcription, StageError> {
        let transcriber = &self.transcriber;
        let media_path = file.path.as_path();
        let raw = self
            .call_engine("transcription", move || transcriber.transcribe(media_path))
            .await
            .at(Stage::Transcribe)?;

        let segments = self.aligner.align(&raw.fragments);
        tracing::debug!(
            file_id = %file.id,
            fragments = raw.fragments.len(),
            segments = segments.len(),
            "aligned transcript"
        );

        let transcription = Transcription {
            id: Uuid::new_v4(),
            file_id: file.id,
            full_transcript: raw.text,
            duration: transcript_duration(&segments),
            segments,
            language: raw.language,
            created_at: Utc::now(),
            status: TranscriptionStatus::Completed,
        };

        self.store
            .insert_transcription(transcription)
            .await
            .at(Stage::PersistTranscription)
    }

    async fn generate_questions(
        &self,
        transcription: &Transcription,
    ) -> std::result::Result<QuestionTally, StageError> {
        let mut tally = QuestionTally {
            persisted: 0,
            failed_segments: Vec::new(),
        };

        for segment in &transcription.segments {
            tracing::debug!(
                file_id = %transcription.file_id,
                segment_index = segment.segment_index,
                window = %format_window(segment),
                "generating questions"
            );
            match self.questions_for_segment(segment).await {
                Ok(generated) => {
                    for question in generated {
                        let question = Question::from_generated(
                            transcription.id,
                            segment.segment_index,
                            question,
                        );
                        if let Err(e) = question.validate() {
                            tracing::warn!(
                                file_id = %transcription.file_id,
                                segment_index = segment.segment_index,
                                "dropping invalid generated question: {e}"
                            );
                            continue;
                        }
                        self.store
                            .insert_question(question)
                            .await
                            .at(Stage::GenerateQuestions)?;
                        tally.persisted += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        file_id = %transcription.file_id,
                        segment_index = segment.segment_index,
                        "question generation failed for segment: {e}"
                    );
                    tally.failed_segments.push(segment.segment_index);
                }
            }
        }

        Ok(tally)
    }

    async fn questions_for_segment(
        &self,
        segment: &Segment,
    ) -> Result<Vec<GeneratedQuestion>> {
        let engine = &self.questions;
        let text = segment.text.as_str();
        self.call_engine("question generation", move || engine.generate(text))
            .await
    }

    /// Applies the configured timeout and retry policy to one engine call.
    async fn call_engine<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retry = self.settings.retry;
        let timeout = self.settings.engine_timeout;
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(MediaQuizError::Timeout {
                    operation,
                    after: timeout,
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    let delay = retry.backoff(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        "engine call failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Mark a file `failed` after its run task died without an outcome.
    pub async fn record_abort(&self, file_id: Uuid, reason: String) -> RunFailure {
        tracing::error!(file_id = %file_id, "pipeline aborted: {reason}");
        let status_recorded = self.record_failure(file_id, None).await;
        RunFailure {
            file_id,
            stage: Stage::Aborted,
            reason,
            status_recorded,
        }
    }

    async fn record_failure(&self, file_id: Uuid, written: Option<Uuid>) -> bool {
        match self.store.set_file_status(file_id, FileStatus::Failed).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => {
                // Deleted mid-run: the cascade could not see what this run wrote.
                tracing::warn!(file_id = %file_id, "file deleted while processing, discarding results");
                if let Some(transcription_id) = written {
                    self.discard_results(file_id, transcription_id).await;
                }
                false
            }
            Err(e) => {
                tracing::error!(
                    file_id = %file_id,
                    "could not record failed status, file left processing: {e}"
                );
                false
            }
        }
    }

    async fn discard_results(&self, file_id: Uuid, transcription_id: Uuid) {
        match self
            .store
            .delete_questions_for_transcription(transcription_id)
            .await
        {
            Ok(removed) => tracing::debug!(
                file_id = %file_id,
                transcription_id = %transcription_id,
                questions = removed,
                "discarded questions of deleted file"
            ),
            Err(e) => tracing::error!(
                file_id = %file_id,
                transcription_id = %transcription_id,
                "could not discard questions of deleted file: {e}"
            ),
        }
        match self.store.delete_transcription(transcription_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => tracing::error!(
                file_id = %file_id,
                transcription_id = %transcription_id,
                "could not discard transcription of deleted file: {e}"
            ),
        }
    }
}
