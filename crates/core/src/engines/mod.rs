//! Speech recognition and question generation behind swappable trait objects.

pub mod fake;
pub mod llm;
mod scratch;
pub mod whisper_cli;
#[cfg(feature = "whisper")]
pub mod whisper_local;

use std::{path::Path, sync::Arc};

use async_trait::async_trait;

use crate::{
    config::{QuestionEngineKind, QuestionsConfig, TranscriptionConfig, TranscriptionEngineKind},
    error::Result,
    types::{GeneratedQuestion, RawTranscript},
};

pub use fake::{FakeQuestionEngine, FakeTranscriptionEngine};
pub use llm::LlmQuestionEngine;
pub use whisper_cli::WhisperCliEngine;
#[cfg(feature = "whisper")]
pub use whisper_local::WhisperLocalEngine;

/// Turns a locally readable media file into text plus timed fragments.
///
/// Implementations report failures as `MediaQuizError::TranscriptionFailed`.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(&self, media_path: &Path) -> Result<RawTranscript>;
}

/// Produces multiple-choice questions for one window of transcript text.
///
/// Implementations report failures as `MediaQuizError::QuestionGenerationFailed`.
#[async_trait]
pub trait QuestionEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, segment_text: &str) -> Result<Vec<GeneratedQuestion>>;
}

pub fn build_transcription_engine(
    config: &TranscriptionConfig,
    scratch_dir: &Path,
) -> Result<Arc<dyn TranscriptionEngine>> {
    match config.engine {
        TranscriptionEngineKind::Fake => Ok(Arc::new(FakeTranscriptionEngine::new())),
        TranscriptionEngineKind::WhisperCli => Ok(Arc::new(WhisperCliEngine::new(
            &config.whisper_bin,
            &config.model,
            config.language.clone(),
            scratch_dir,
        ))),
        #[cfg(feature = "whisper")]
        TranscriptionEngineKind::WhisperLocal => {
            let model_path = config.model_path.clone().ok_or_else(|| {
                crate::error::MediaQuizError::validation(
                    "transcription.model_path is required for the whisper_local engine",
                )
            })?;
            Ok(Arc::new(WhisperLocalEngine::new(
                model_path,
                &config.ffmpeg_bin,
                config.language.clone(),
                scratch_dir,
            )))
        }
        #[cfg(not(feature = "whisper"))]
        TranscriptionEngineKind::WhisperLocal => Err(crate::error::MediaQuizError::validation(
            "the whisper_local engine requires building with the `whisper` feature",
        )),
    }
}

pub fn build_question_engine(config: &QuestionsConfig) -> Result<Arc<dyn QuestionEngine>> {
    match config.engine {
        QuestionEngineKind::Fake => Ok(Arc::new(FakeQuestionEngine::new())),
        QuestionEngineKind::Llm => {
            // Fail at startup rather than on the first segment.
            let api_key = config.provider.api_key()?;
            let endpoint = config
                .provider
                .endpoint(config.api_url.as_deref(), config.model.as_deref());
            Ok(Arc::new(LlmQuestionEngine::new(
                config.provider,
                endpoint,
                api_key,
                config.questions_per_segment,
            )))
        }
    }
}
