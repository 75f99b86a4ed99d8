use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use uuid::Uuid;

use crate::{
    engines::{TranscriptionEngine, scratch::ScratchPath},
    error::{MediaQuizError, Result},
    format::format_fragments_with_timestamps,
    types::RawTranscript,
};

/// Transcribes by shelling out to the `whisper` command line tool.
pub struct WhisperCliEngine {
    binary: String,
    model: String,
    language: Option<String>,
    scratch_dir: PathBuf,
}

impl WhisperCliEngine {
    pub fn new(binary: &str, model: &str, language: Option<String>, scratch_dir: &Path) -> Self {
        Self {
            binary: binary.to_string(),
            model: model.to_string(),
            language,
            scratch_dir: scratch_dir.to_path_buf(),
        }
    }

    fn failed(media_path: &Path, reason: impl Into<String>) -> MediaQuizError {
        MediaQuizError::TranscriptionFailed {
            media_path: media_path.to_path_buf(),
            reason: reason.into(),
        }
    }

    async fn run_whisper(&self, media_path: &Path, output_dir: &Path) -> Result<RawTranscript> {
        let mut command = Command::new(&self.binary);
        command
            .arg(media_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(output_dir)
            .kill_on_drop(true);
        if let Some(language) = &self.language {
            command.arg("--language").arg(language);
        }

        let output = command
            .output()
            .await
            .map_err(|e| Self::failed(media_path, format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(Self::failed(
                media_path,
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        // Whisper names output based on input filename
        let stem = media_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| Self::failed(media_path, "media path has no file name"))?;
        let json_path = output_dir.join(format!("{stem}.json"));

        let json_content = fs::read_to_string(&json_path).await.map_err(|e| {
            Self::failed(
                media_path,
                format!("missing whisper output {}: {e}", json_path.display()),
            )
        })?;

        parse_whisper_json(&json_content).map_err(|e| Self::failed(media_path, e.to_string()))
    }
}

/// Parse whisper's JSON output, trimming the padding whisper puts around text.
pub fn parse_whisper_json(content: &str) -> Result<RawTranscript> {
    let mut transcript: RawTranscript = serde_json::from_str(content)?;
    transcript.text = transcript.text.trim().to_string();
    for fragment in &mut transcript.fragments {
        fragment.text = fragment.text.trim().to_string();
    }
    Ok(transcript)
}

#[async_trait]
impl TranscriptionEngine for WhisperCliEngine {
    fn name(&self) -> &str {
        "whisper-cli"
    }

    async fn transcribe(&self, media_path: &Path) -> Result<RawTranscript> {
        let output_dir = ScratchPath::new(self.scratch_dir.join(Uuid::new_v4().to_string()));
        fs::create_dir_all(output_dir.path())
            .await
            .map_err(|e| Self::failed(media_path, format!("cannot create scratch dir: {e}")))?;

        let result = self.run_whisper(media_path, output_dir.path()).await;
        drop(output_dir);

        if let Ok(transcript) = &result {
            tracing::debug!(
                fragments = transcript.fragments.len(),
                "whisper output:\n{}",
                format_fragments_with_timestamps(&transcript.fragments)
            );
        }

        result
    }
}
