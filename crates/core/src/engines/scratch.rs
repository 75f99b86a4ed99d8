use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// A per-run file or directory under the scratch dir, removed on drop.
///
/// Dropping covers every exit, including a timeout cancelling the
/// transcription future between awaits.
pub(crate) struct ScratchPath {
    path: PathBuf,
}

impl ScratchPath {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchPath {
    fn drop(&mut self) {
        let removed = if self.path.is_dir() {
            std::fs::remove_dir_all(&self.path)
        } else {
            std::fs::remove_file(&self.path)
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "failed to clean scratch path: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_directory_with_contents() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("run");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("lecture.json"), "{}").unwrap();

        drop(ScratchPath::new(dir.clone()));

        assert!(!dir.exists());
    }

    #[test]
    fn drop_removes_file_and_tolerates_missing_paths() {
        let root = tempfile::tempdir().unwrap();
        let wav = root.path().join("audio.wav");
        std::fs::write(&wav, b"RIFF").unwrap();

        drop(ScratchPath::new(wav.clone()));
        drop(ScratchPath::new(root.path().join("never-created")));

        assert!(!wav.exists());
        assert!(root.path().exists());
    }
}
