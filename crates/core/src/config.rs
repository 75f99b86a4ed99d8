use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize, de::DeserializeOwned, de::IntoDeserializer};

use crate::{
    align::DEFAULT_WINDOW_SECONDS,
    pipeline::{PipelineSettings, QuestionPolicy, RecoveryAction, RecoverySettings, RetryPolicy},
    provider::Provider,
};

/// 100 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub transcription: TranscriptionConfig,
    pub questions: QuestionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Json,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Defaults to the platform data directory when unset.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub window_seconds: f64,
    pub generate_questions: bool,
    pub question_policy: QuestionPolicy,
    pub engine_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub max_concurrent: usize,
    /// How long a file must have sat in `processing` before startup recovery
    /// touches it. Zero, the default, recovers every one: nothing else is
    /// running when the scan happens.
    pub stale_after_secs: u64,
    pub recovery_action: RecoveryAction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionEngineKind {
    Fake,
    WhisperCli,
    WhisperLocal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub engine: TranscriptionEngineKind,
    pub whisper_bin: String,
    pub ffmpeg_bin: String,
    /// Model name passed to the whisper CLI.
    pub model: String,
    /// ggml model file for the in-process engine.
    pub model_path: Option<PathBuf>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionEngineKind {
    Fake,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuestionsConfig {
    pub engine: QuestionEngineKind,
    pub provider: Provider,
    /// Chat completions URL, for self-hosted OpenAI-compatible servers.
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub questions_per_segment: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            data_dir: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_WINDOW_SECONDS,
            generate_questions: true,
            question_policy: QuestionPolicy::BestEffort,
            engine_timeout_secs: 600,
            retry_attempts: 1,
            retry_backoff_ms: 500,
            max_concurrent: 2,
            stale_after_secs: 0,
            recovery_action: RecoveryAction::Retry,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            engine: TranscriptionEngineKind::Fake,
            whisper_bin: "whisper".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            model: "base".to_string(),
            model_path: None,
            language: None,
        }
    }
}

impl Default for QuestionsConfig {
    fn default() -> Self {
        Self {
            engine: QuestionEngineKind::Fake,
            provider: Provider::default(),
            api_url: None,
            model: None,
            questions_per_segment: 3,
        }
    }
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("mediaquiz")
        })
    }

    pub fn records_dir(&self) -> PathBuf {
        self.data_dir().join("records")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir().join("uploads")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir().join("scratch")
    }
}

impl Config {
    /// Load configuration from a TOML file. Missing fields use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults only when the file is missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Returns ~/.config/mediaquiz/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mediaquiz")
            .join("config.toml")
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - MEDIAQUIZ_BIND → server.bind
    /// - PORT → port of server.bind
    /// - MEDIAQUIZ_DATA_DIR → storage.data_dir
    /// - MEDIAQUIZ_STORAGE_BACKEND → storage.backend
    /// - MEDIAQUIZ_TRANSCRIPTION_ENGINE → transcription.engine
    /// - MEDIAQUIZ_QUESTION_ENGINE → questions.engine
    /// - MEDIAQUIZ_PROVIDER → questions.provider
    /// - MEDIAQUIZ_LLM_MODEL → questions.model
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(bind) = get("MEDIAQUIZ_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = get("PORT") {
            let port: u16 = port.parse().with_context(|| format!("invalid PORT {port}"))?;
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "127.0.0.1".to_string());
            self.server.bind = format!("{host}:{port}");
        }
        if let Some(dir) = get("MEDIAQUIZ_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(backend) = get("MEDIAQUIZ_STORAGE_BACKEND") {
            self.storage.backend = parse_kind("MEDIAQUIZ_STORAGE_BACKEND", &backend)?;
        }
        if let Some(engine) = get("MEDIAQUIZ_TRANSCRIPTION_ENGINE") {
            self.transcription.engine = parse_kind("MEDIAQUIZ_TRANSCRIPTION_ENGINE", &engine)?;
        }
        if let Some(engine) = get("MEDIAQUIZ_QUESTION_ENGINE") {
            self.questions.engine = parse_kind("MEDIAQUIZ_QUESTION_ENGINE", &engine)?;
        }
        if let Some(provider) = get("MEDIAQUIZ_PROVIDER") {
            self.questions.provider = provider.parse()?;
        }
        if let Some(model) = get("MEDIAQUIZ_LLM_MODEL") {
            self.questions.model = Some(model);
        }

        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let p = &self.pipeline;
        anyhow::ensure!(
            p.window_seconds.is_finite() && p.window_seconds > 0.0,
            "pipeline.window_seconds must be > 0"
        );
        anyhow::ensure!(p.max_concurrent > 0, "pipeline.max_concurrent must be > 0");
        anyhow::ensure!(p.retry_attempts > 0, "pipeline.retry_attempts must be > 0");
        anyhow::ensure!(
            p.engine_timeout_secs > 0,
            "pipeline.engine_timeout_secs must be > 0"
        );
        anyhow::ensure!(
            self.server.max_upload_bytes > 0,
            "server.max_upload_bytes must be > 0"
        );
        anyhow::ensure!(
            self.questions.questions_per_segment > 0,
            "questions.questions_per_segment must be > 0"
        );
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let p = &self.pipeline;
        PipelineSettings {
            window_seconds: p.window_seconds,
            generate_questions: p.generate_questions,
            question_policy: p.question_policy,
            engine_timeout: Duration::from_secs(p.engine_timeout_secs),
            retry: RetryPolicy {
                max_attempts: p.retry_attempts,
                initial_backoff: Duration::from_millis(p.retry_backoff_ms),
            },
        }
    }

    pub fn recovery_settings(&self) -> RecoverySettings {
        RecoverySettings {
            stale_after: Duration::from_secs(self.pipeline.stale_after_secs),
            action: self.pipeline.recovery_action,
        }
    }
}

fn parse_kind<T: DeserializeOwned>(key: &str, value: &str) -> anyhow::Result<T> {
    T::deserialize(value.into_deserializer())
        .map_err(|e: serde::de::value::Error| anyhow::anyhow!("invalid {key}={value}: {e}"))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[pipeline]
window_seconds = 120.0
question_policy = "required"

[transcription]
engine = "whisper_cli"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.pipeline.window_seconds, 120.0);
        assert_eq!(config.pipeline.question_policy, QuestionPolicy::Required);
        assert_eq!(config.pipeline.retry_attempts, 1);
        assert_eq!(config.transcription.engine, TranscriptionEngineKind::WhisperCli);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn invalid_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline\nwindow_seconds = ").unwrap();
        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PORT", "8088"),
            ("MEDIAQUIZ_DATA_DIR", "/srv/mediaquiz"),
            ("MEDIAQUIZ_STORAGE_BACKEND", "memory"),
            ("MEDIAQUIZ_QUESTION_ENGINE", "llm"),
            ("MEDIAQUIZ_PROVIDER", "gemini"),
            ("MEDIAQUIZ_LLM_MODEL", "gemini-2.5-pro"),
        ]);

        let config = Config::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:8088");
        assert_eq!(config.storage.uploads_dir(), PathBuf::from("/srv/mediaquiz/uploads"));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.questions.engine, QuestionEngineKind::Llm);
        assert_eq!(config.questions.provider, Provider::Gemini);
        assert_eq!(config.questions.model.as_deref(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn unknown_engine_override_is_rejected() {
        let result = Config::default().with_overrides(|k| {
            (k == "MEDIAQUIZ_TRANSCRIPTION_ENGINE").then(|| "vosk".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn validation_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.pipeline.max_concurrent = 0;
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }
}
