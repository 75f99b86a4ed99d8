use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::{fs, sync::Mutex};
use uuid::Uuid;

use crate::{
    error::{MediaQuizError, Result},
    store::{Store, sort_files, sort_questions, sort_transcriptions},
    types::{FileStatus, MediaFile, Question, Transcription},
};

const FILES: &str = "files";
const TRANSCRIPTIONS: &str = "transcriptions";
const QUESTIONS: &str = "questions";

/// One pretty-printed JSON document per record:
/// `<root>/{files,transcriptions,questions}/<uuid>.json`.
pub struct JsonStore {
    root: PathBuf,
    // Serializes read-modify-write sequences
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for collection in [FILES, TRANSCRIPTIONS, QUESTIONS] {
            fs::create_dir_all(root.join(collection))
                .await
                .map_err(|e| persistence(&root.join(collection), e))?;
        }
        tracing::info!(root = %root.display(), "opened json store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, collection: &str, id: Uuid) -> PathBuf {
        self.root.join(collection).join(format!("{id}.json"))
    }

    async fn write<T: Serialize>(&self, collection: &str, id: Uuid, record: &T) -> Result<()> {
        let path = self.record_path(collection, id);
        let tmp = path.with_extension("json.tmp");
        let pretty_json = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, &pretty_json)
            .await
            .map_err(|e| persistence(&tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| persistence(&path, e))?;
        Ok(())
    }

    async fn read<T: DeserializeOwned>(
        &self,
        collection: &str,
        entity: &'static str,
        id: Uuid,
    ) -> Result<T> {
        let path = self.record_path(collection, id);
        let json_content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaQuizError::not_found(entity, id));
            }
            Err(e) => return Err(persistence(&path, e)),
        };
        serde_json::from_str(&json_content)
            .map_err(|e| MediaQuizError::Persistence(format!("corrupt record {}: {e}", path.display())))
    }

    async fn remove<T: DeserializeOwned>(
        &self,
        collection: &str,
        entity: &'static str,
        id: Uuid,
    ) -> Result<T> {
        let record = self.read(collection, entity, id).await?;
        let path = self.record_path(collection, id);
        fs::remove_file(&path)
            .await
            .map_err(|e| persistence(&path, e))?;
        Ok(record)
    }

    async fn read_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let dir = self.root.join(collection);
        let mut entries = fs::read_dir(&dir).await.map_err(|e| persistence(&dir, e))?;
        let mut records = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|e| persistence(&dir, e))? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let json_content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                // Removed between listing and reading
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(persistence(&path, e)),
            };
            match serde_json::from_str(&json_content) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable record: {e}");
                }
            }
        }

        Ok(records)
    }
}

fn persistence(path: &Path, err: std::io::Error) -> MediaQuizError {
    MediaQuizError::Persistence(format!("{}: {err}", path.display()))
}

#[async_trait]
impl Store for JsonStore {
    async fn insert_file(&self, file: MediaFile) -> Result<MediaFile> {
        self.write(FILES, file.id, &file).await?;
        Ok(file)
    }

    async fn get_file(&self, id: Uuid) -> Result<MediaFile> {
        self.read(FILES, "File", id).await
    }

    async fn list_files(&self) -> Result<Vec<MediaFile>> {
        let mut files = self.read_all(FILES).await?;
        sort_files(&mut files);
        Ok(files)
    }

    async fn set_file_status(&self, id: Uuid, status: FileStatus) -> Result<MediaFile> {
        let _guard = self.write_lock.lock().await;
        let mut file: MediaFile = self.read(FILES, "File", id).await?;
        file.status = status;
        file.status_updated_at = Utc::now();
        self.write(FILES, id, &file).await?;
        Ok(file)
    }

    async fn delete_file(&self, id: Uuid) -> Result<MediaFile> {
        let _guard = self.write_lock.lock().await;
        self.remove(FILES, "File", id).await
    }

    async fn insert_transcription(&self, transcription: Transcription) -> Result<Transcription> {
        self.write(TRANSCRIPTIONS, transcription.id, &transcription)
            .await?;
        Ok(transcription)
    }

    async fn get_transcription(&self, id: Uuid) -> Result<Transcription> {
        self.read(TRANSCRIPTIONS, "Transcription", id).await
    }

    async fn find_transcription_by_file(&self, file_id: Uuid) -> Result<Option<Transcription>> {
        let all: Vec<Transcription> = self.read_all(TRANSCRIPTIONS).await?;
        Ok(all.into_iter().find(|t| t.file_id == file_id))
    }

    async fn list_transcriptions(&self) -> Result<Vec<Transcription>> {
        let mut all = self.read_all(TRANSCRIPTIONS).await?;
        sort_transcriptions(&mut all);
        Ok(all)
    }

    async fn delete_transcription(&self, id: Uuid) -> Result<Transcription> {
        let _guard = self.write_lock.lock().await;
        self.remove(TRANSCRIPTIONS, "Transcription", id).await
    }

    async fn insert_question(&self, question: Question) -> Result<Question> {
        self.write(QUESTIONS, question.id, &question).await?;
        Ok(question)
    }

    async fn get_question(&self, id: Uuid) -> Result<Question> {
        self.read(QUESTIONS, "Question", id).await
    }

    async fn update_question(&self, question: Question) -> Result<Question> {
        let _guard = self.write_lock.lock().await;
        let _existing: Question = self.read(QUESTIONS, "Question", question.id).await?;
        self.write(QUESTIONS, question.id, &question).await?;
        Ok(question)
    }

    async fn delete_question(&self, id: Uuid) -> Result<Question> {
        let _guard = self.write_lock.lock().await;
        self.remove(QUESTIONS, "Question", id).await
    }

    async fn list_questions(
        &self,
        transcription_id: Uuid,
        segment_index: Option<u32>,
    ) -> Result<Vec<Question>> {
        let all: Vec<Question> = self.read_all(QUESTIONS).await?;
        let mut questions: Vec<_> = all
            .into_iter()
            .filter(|q| q.transcription_id == transcription_id)
            .filter(|q| segment_index.is_none_or(|idx| q.segment_index == idx))
            .collect();
        sort_questions(&mut questions);
        Ok(questions)
    }

    async fn delete_questions_for_transcription(&self, transcription_id: Uuid) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let all: Vec<Question> = self.read_all(QUESTIONS).await?;
        let mut removed = 0;
        for question in all.iter().filter(|q| q.transcription_id == transcription_id) {
            let path = self.record_path(QUESTIONS, question.id);
            fs::remove_file(&path)
                .await
                .map_err(|e| persistence(&path, e))?;
            removed += 1;
        }
        Ok(removed)
    }

    async fn close(&self) -> Result<()> {
        // Wait out any write still holding the lock
        let _guard = self.write_lock.lock().await;
        tracing::info!(root = %self.root.display(), "closed json store");
        Ok(())
    }
}
