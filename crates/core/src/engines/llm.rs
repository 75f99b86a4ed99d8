use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    engines::QuestionEngine,
    error::{MediaQuizError, Result},
    provider::{Provider, ProviderEndpoint},
    types::GeneratedQuestion,
};

static QUESTION_PROMPT: &str = r#"You are a teaching assistant. You write multiple-choice comprehension questions about a fragment of a lecture transcript.

You MUST output ONLY valid JSON matching this exact structure (no markdown, no explanation):
[
  {
    "question": "Clear question about the fragment",
    "options": [
      {"text": "Option A", "isCorrect": true},
      {"text": "Option B", "isCorrect": false},
      {"text": "Option C", "isCorrect": false},
      {"text": "Option D", "isCorrect": false}
    ],
    "explanation": "One sentence on why the correct option is right",
    "difficulty": "easy|medium|hard"
  }
]

Rules:
- Questions must be answerable from the fragment alone
- Exactly 4 options per question, at least one marked correct
- Mix difficulties when the fragment allows it
- Output ONLY the JSON, nothing else"#;

/// Generates questions through an OpenAI-compatible chat completions API.
pub struct LlmQuestionEngine {
    provider: Provider,
    endpoint: ProviderEndpoint,
    api_key: String,
    questions_per_segment: u32,
    client: reqwest::Client,
}

impl LlmQuestionEngine {
    pub fn new(
        provider: Provider,
        endpoint: ProviderEndpoint,
        api_key: String,
        questions_per_segment: u32,
    ) -> Self {
        Self {
            provider,
            endpoint,
            api_key,
            questions_per_segment,
            client: reqwest::Client::new(),
        }
    }

    async fn request(&self, segment_text: &str) -> Result<String> {
        let user_prompt = format!(
            "Write {} questions about this transcript fragment:\n\n{}",
            self.questions_per_segment, segment_text
        );

        let response = self
            .client
            .post(&self.endpoint.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.endpoint.model,
                "messages": [
                    {
                        "role": "system",
                        "content": QUESTION_PROMPT,
                    },
                    {
                        "role": "user",
                        "content": user_prompt,
                    },
                ],
                "temperature": 0.3,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        // Extract content from response
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| MediaQuizError::QuestionGenerationFailed {
                reason: format!("Invalid API response: {:?}", response),
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionPayload {
    List(Vec<GeneratedQuestion>),
    Wrapped { questions: Vec<GeneratedQuestion> },
}

/// Parse a model reply into questions, tolerating a surrounding code fence.
pub fn parse_questions(content: &str) -> Result<Vec<GeneratedQuestion>> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let payload: QuestionPayload = serde_json::from_str(body.trim())?;
    Ok(match payload {
        QuestionPayload::List(questions) => questions,
        QuestionPayload::Wrapped { questions } => questions,
    })
}

#[async_trait]
impl QuestionEngine for LlmQuestionEngine {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn generate(&self, segment_text: &str) -> Result<Vec<GeneratedQuestion>> {
        let content = self.request(segment_text).await.map_err(|e| match e {
            e @ MediaQuizError::QuestionGenerationFailed { .. } => e,
            other => MediaQuizError::QuestionGenerationFailed {
                reason: other.to_string(),
            },
        })?;

        parse_questions(&content).map_err(|e| MediaQuizError::QuestionGenerationFailed {
            reason: format!("unparseable model output: {e}"),
        })
    }
}
