use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use uuid::Uuid;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{
    engines::{TranscriptionEngine, scratch::ScratchPath},
    error::{MediaQuizError, Result},
    types::{Fragment, RawTranscript},
};

/// In-process whisper.cpp transcription via whisper-rs.
///
/// Media is first converted to 16 kHz mono PCM with ffmpeg; inference runs on
/// the blocking pool.
pub struct WhisperLocalEngine {
    model_path: PathBuf,
    ffmpeg_bin: String,
    language: Option<String>,
    scratch_dir: PathBuf,
}

impl WhisperLocalEngine {
    pub fn new(
        model_path: PathBuf,
        ffmpeg_bin: &str,
        language: Option<String>,
        scratch_dir: &Path,
    ) -> Self {
        Self {
            model_path,
            ffmpeg_bin: ffmpeg_bin.to_string(),
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

    /// Extract audio from media using ffmpeg
    async fn extract_audio(&self, media_path: &Path, audio_path: &Path) -> Result<()> {
        let output = Command::new(&self.ffmpeg_bin)
            .arg("-y")
            .arg("-i")
            .arg(media_path)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg(audio_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Self::failed(media_path, format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(Self::failed(
                media_path,
                format!(
                    "audio extraction failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            ));
        }

        Ok(())
    }
}

fn run_model(
    model_path: &Path,
    audio_path: &Path,
    language: Option<&str>,
) -> std::result::Result<RawTranscript, String> {
    let mut reader = hound::WavReader::open(audio_path).map_err(|e| e.to_string())?;
    let samples: Vec<f32> = reader
        .samples::<i16>()
        .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| e.to_string())?;

    let ctx_params = WhisperContextParameters {
        use_gpu: true,
        flash_attn: true,
        ..Default::default()
    };
    let model_path_str = model_path
        .to_str()
        .ok_or_else(|| format!("model path is not UTF-8: {}", model_path.display()))?;
    let ctx = WhisperContext::new_with_params(model_path_str, ctx_params)
        .map_err(|e| format!("failed to load model: {e}"))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
    params.set_language(language);

    let mut state = ctx
        .create_state()
        .map_err(|e| format!("failed to create state: {e}"))?;
    state
        .full(params, &samples)
        .map_err(|e| format!("failed to run model: {e}"))?;

    let mut texts = Vec::new();
    let mut fragments = Vec::new();

    for segment in state.as_iter() {
        let seg_text = match segment.to_str() {
            Ok(s) => s.trim(),
            Err(_) => continue,
        };
        fragments.push(Fragment {
            start: segment.start_timestamp() as f64 / 100.0,
            end: segment.end_timestamp() as f64 / 100.0,
            text: seg_text.to_string(),
        });
        texts.push(seg_text.to_string());
    }

    let language_index = state.full_lang_id_from_state();
    let language = whisper_rs::get_lang_str(language_index).map(str::to_string);

    Ok(RawTranscript {
        text: texts.join(" "),
        fragments,
        language,
    })
}

#[async_trait]
impl TranscriptionEngine for WhisperLocalEngine {
    fn name(&self) -> &str {
        "whisper-local"
    }

    async fn transcribe(&self, media_path: &Path) -> Result<RawTranscript> {
        fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| Self::failed(media_path, format!("cannot create scratch dir: {e}")))?;
        let audio = ScratchPath::new(self.scratch_dir.join(format!("{}.wav", Uuid::new_v4())));

        self.extract_audio(media_path, audio.path()).await?;

        let model_path = self.model_path.clone();
        let wav = audio.path().to_path_buf();
        let language = self.language.clone();
        let result =
            tokio::task::spawn_blocking(move || run_model(&model_path, &wav, language.as_deref()))
                .await;
        drop(audio);

        match result {
            Ok(Ok(transcript)) => Ok(transcript),
            Ok(Err(reason)) => Err(Self::failed(media_path, reason)),
            Err(join) => Err(Self::failed(media_path, format!("inference task failed: {join}"))),
        }
    }
}
