use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::{
    config::DEFAULT_MAX_UPLOAD_BYTES,
    error::{MediaQuizError, Result},
};

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/x-wav",
    "audio/mp4",
    "audio/aac",
    "audio/ogg",
    "audio/webm",
    "video/mp4",
    "video/mpeg",
    "video/quicktime",
    "video/x-msvideo",
];

/// What an upload must satisfy before anything is written.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub allowed_mime_types: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::with_max_bytes(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadPolicy {
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self {
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
            max_bytes,
        }
    }

    pub fn check(&self, mime_type: &str, size: u64) -> Result<()> {
        if !self.allowed_mime_types.iter().any(|m| m == mime_type) {
            return Err(MediaQuizError::validation(
                "Invalid file type. Only video and audio files are allowed.",
            ));
        }
        if size == 0 {
            return Err(MediaQuizError::validation("No file uploaded"));
        }
        if size > self.max_bytes {
            return Err(MediaQuizError::validation(format!(
                "File too large. Maximum size is {} MB.",
                self.max_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredUpload {
    pub filename: String,
    pub path: PathBuf,
}

/// Uploaded media on local disk, one file per upload.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Name for a new upload, keeping the original extension.
    pub fn stored_name(original_name: &str) -> String {
        let ext = Path::new(original_name)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .filter(|e| !e.is_empty());
        match ext {
            Some(ext) => format!("video-{}.{ext}", Uuid::new_v4()),
            None => format!("video-{}", Uuid::new_v4()),
        }
    }

    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredUpload> {
        let filename = Self::stored_name(original_name);
        let path = self.dir.join(&filename);
        fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "stored upload");
        Ok(StoredUpload { filename, path })
    }

    /// Missing files are not an error.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
