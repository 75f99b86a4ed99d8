use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum MediaQuizError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Transcription failed for {media_path}: {reason}")]
    TranscriptionFailed { media_path: PathBuf, reason: String },

    #[error("Question generation failed: {reason}")]
    QuestionGenerationFailed { reason: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl MediaQuizError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MediaQuizError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        MediaQuizError::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MediaQuizError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, MediaQuizError>;
