use std::{
    path::Path,
    sync::atomic::{AtomicU32, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    engines::{QuestionEngine, TranscriptionEngine},
    error::{MediaQuizError, Result},
    types::{Difficulty, Fragment, GeneratedQuestion, QuestionOption, RawTranscript},
};

/// Deterministic transcription engine for tests and local runs.
#[derive(Debug)]
pub struct FakeTranscriptionEngine {
    fragments: Vec<Fragment>,
    language: Option<String>,
    failure: Option<String>,
    transient_failures: AtomicU32,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Default for FakeTranscriptionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTranscriptionEngine {
    /// Ten minutes of speech in five two-minute fragments.
    pub fn new() -> Self {
        let texts = [
            "This is the first segment of the transcription covering the first two minutes.",
            "This is the second segment covering minutes two to four of the audio.",
            "This is the third segment covering minutes four to six of the transcription.",
            "This is the fourth segment covering the next two minutes of content.",
            "This is the final segment covering the last portion of the audio file.",
        ];
        let fragments = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Fragment {
                start: i as f64 * 120.0,
                end: (i + 1) as f64 * 120.0,
                text: text.to_string(),
            })
            .collect();

        Self::with_fragments(fragments)
    }

    pub fn with_fragments(fragments: Vec<Fragment>) -> Self {
        Self {
            fragments,
            language: Some("en".to_string()),
            failure: None,
            transient_failures: AtomicU32::new(0),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Configure the engine to fail on every call
    pub fn with_failure(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_string());
        self
    }

    /// Configure the engine to fail the first `count` calls, then succeed
    pub fn failing_first(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionEngine for FakeTranscriptionEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn transcribe(&self, media_path: &Path) -> Result<RawTranscript> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.clone().or_else(|| {
            self.transient_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .ok()
                .map(|_| "transient fake failure".to_string())
        });
        if let Some(reason) = failure {
            return Err(MediaQuizError::TranscriptionFailed {
                media_path: media_path.to_path_buf(),
                reason,
            });
        }

        Ok(RawTranscript {
            text: self
                .fragments
                .iter()
                .map(|f| f.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            fragments: self.fragments.clone(),
            language: self.language.clone(),
        })
    }
}

/// Deterministic question engine: two questions per window.
#[derive(Debug, Default)]
pub struct FakeQuestionEngine {
    fail_marker: Option<String>,
    calls: AtomicUsize,
}

impl FakeQuestionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail for every window whose text contains `marker`
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionEngine for FakeQuestionEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, segment_text: &str) -> Result<Vec<GeneratedQuestion>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_marker {
            if segment_text.contains(marker.as_str()) {
                return Err(MediaQuizError::QuestionGenerationFailed {
                    reason: format!("fake engine refuses text containing {marker:?}"),
                });
            }
        }

        let preview: String = segment_text.chars().take(50).collect();

        Ok(vec![
            GeneratedQuestion {
                question: format!(
                    "Based on the content \"{preview}...\", what is the main topic discussed?"
                ),
                options: vec![
                    QuestionOption::new("Technology and innovation", true),
                    QuestionOption::new("Sports and recreation", false),
                    QuestionOption::new("Cooking and recipes", false),
                    QuestionOption::new("Travel and tourism", false),
                ],
                explanation: Some(
                    "The main topic is determined by the key themes mentioned in the segment."
                        .to_string(),
                ),
                difficulty: Difficulty::Medium,
            },
            GeneratedQuestion {
                question: "Which of the following best summarizes this segment?".to_string(),
                options: vec![
                    QuestionOption::new("A detailed explanation of the subject matter", true),
                    QuestionOption::new("A brief introduction only", false),
                    QuestionOption::new("A conclusion and summary", false),
                    QuestionOption::new("A list of references", false),
                ],
                explanation: Some(
                    "This question tests comprehension of the segment's structure and content."
                        .to_string(),
                ),
                difficulty: Difficulty::Easy,
            },
        ])
    }
}
