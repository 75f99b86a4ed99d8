use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MediaQuizError, Result};

/// One variable-length unit of recognizer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Full recognizer output for one media file.
///
/// Whisper's JSON output names the fragment list `segments`, so both spellings
/// are accepted when deserializing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTranscript {
    pub text: String,
    #[serde(alias = "segments")]
    pub fragments: Vec<Fragment>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub const ALL: [FileStatus; 4] = [
        FileStatus::Uploaded,
        FileStatus::Processing,
        FileStatus::Completed,
        FileStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = MediaQuizError;

    fn from_str(s: &str) -> Result<Self> {
        FileStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| MediaQuizError::validation("Invalid status"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub id: Uuid,
    pub original_name: String,
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: FileStatus,
    pub status_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionStatus {
    Processing,
    Completed,
    Failed,
}

/// A fixed-duration window of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub segment_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcription {
    pub id: Uuid,
    pub file_id: Uuid,
    pub full_transcript: String,
    pub segments: Vec<Segment>,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: TranscriptionStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentList {
    pub transcription_id: Uuid,
    pub segments: Vec<Segment>,
    pub total_segments: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

impl QuestionOption {
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            text: text.into(),
            is_correct,
        }
    }
}

/// A multiple-choice question as produced by a question engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub transcription_id: Uuid,
    pub segment_index: u32,
    pub question: String,
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn from_generated(
        transcription_id: Uuid,
        segment_index: u32,
        generated: GeneratedQuestion,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transcription_id,
            segment_index,
            question: generated.question,
            options: generated.options,
            explanation: generated.explanation,
            difficulty: generated.difficulty,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_question(&self.question, &self.options)
    }
}

/// Payload for creating a question outside the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub transcription_id: Uuid,
    pub segment_index: u32,
    pub question: String,
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl NewQuestion {
    pub fn into_question(self) -> Result<Question> {
        validate_question(&self.question, &self.options)?;
        Ok(Question {
            id: Uuid::new_v4(),
            transcription_id: self.transcription_id,
            segment_index: self.segment_index,
            question: self.question,
            options: self.options,
            explanation: self.explanation,
            difficulty: self.difficulty.unwrap_or_default(),
            created_at: Utc::now(),
        })
    }
}

/// Partial update of a stored question. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionUpdate {
    pub segment_index: Option<u32>,
    pub question: Option<String>,
    pub options: Option<Vec<QuestionOption>>,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl QuestionUpdate {
    pub fn apply(self, mut question: Question) -> Result<Question> {
        if let Some(segment_index) = self.segment_index {
            question.segment_index = segment_index;
        }
        if let Some(text) = self.question {
            question.question = text;
        }
        if let Some(options) = self.options {
            question.options = options;
        }
        if let Some(explanation) = self.explanation {
            question.explanation = Some(explanation);
        }
        if let Some(difficulty) = self.difficulty {
            question.difficulty = difficulty;
        }
        question.validate()?;
        Ok(question)
    }
}

/// Rules shared by pipeline output and direct question edits.
pub fn validate_question(question: &str, options: &[QuestionOption]) -> Result<()> {
    if question.trim().is_empty() {
        return Err(MediaQuizError::validation("Question text is required"));
    }
    if options.len() < 2 {
        return Err(MediaQuizError::validation("At least 2 options are required"));
    }
    if options.iter().any(|o| o.text.trim().is_empty()) {
        return Err(MediaQuizError::validation("Option text is required"));
    }
    if !options.iter().any(|o| o.is_correct) {
        return Err(MediaQuizError::validation(
            "At least one option must be marked as correct",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DifficultyBreakdown {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    pub total_questions: usize,
    pub difficulty_breakdown: DifficultyBreakdown,
    pub segment_breakdown: BTreeMap<u32, usize>,
}

impl QuestionStats {
    pub fn from_questions(questions: &[Question]) -> Self {
        let mut stats = QuestionStats {
            total_questions: questions.len(),
            ..Default::default()
        };

        for q in questions {
            match q.difficulty {
                Difficulty::Easy => stats.difficulty_breakdown.easy += 1,
                Difficulty::Medium => stats.difficulty_breakdown.medium += 1,
                Difficulty::Hard => stats.difficulty_breakdown.hard += 1,
            }
            *stats.segment_breakdown.entry(q.segment_index).or_insert(0) += 1;
        }

        stats
    }
}
