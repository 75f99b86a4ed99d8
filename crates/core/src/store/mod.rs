//! Durable records for files, transcriptions and questions.
//!
//! Three independent collections related only by id. Nothing here enforces
//! referential integrity; cascading deletes live in the service layer.

pub mod json;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    config::{StorageBackend, StorageConfig},
    error::Result,
    types::{FileStatus, MediaFile, Question, Transcription},
};

pub use json::JsonStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_file(&self, file: MediaFile) -> Result<MediaFile>;
    async fn get_file(&self, id: Uuid) -> Result<MediaFile>;
    /// Newest upload first.
    async fn list_files(&self) -> Result<Vec<MediaFile>>;
    async fn set_file_status(&self, id: Uuid, status: FileStatus) -> Result<MediaFile>;
    async fn delete_file(&self, id: Uuid) -> Result<MediaFile>;

    async fn insert_transcription(&self, transcription: Transcription) -> Result<Transcription>;
    async fn get_transcription(&self, id: Uuid) -> Result<Transcription>;
    async fn find_transcription_by_file(&self, file_id: Uuid) -> Result<Option<Transcription>>;
    /// Newest first.
    async fn list_transcriptions(&self) -> Result<Vec<Transcription>>;
    async fn delete_transcription(&self, id: Uuid) -> Result<Transcription>;

    async fn insert_question(&self, question: Question) -> Result<Question>;
    async fn get_question(&self, id: Uuid) -> Result<Question>;
    async fn update_question(&self, question: Question) -> Result<Question>;
    async fn delete_question(&self, id: Uuid) -> Result<Question>;
    /// Ordered by segment index, then creation time.
    async fn list_questions(
        &self,
        transcription_id: Uuid,
        segment_index: Option<u32>,
    ) -> Result<Vec<Question>>;
    /// Returns how many questions were removed.
    async fn delete_questions_for_transcription(&self, transcription_id: Uuid) -> Result<usize>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Json => Ok(Arc::new(JsonStore::open(config.records_dir()).await?)),
    }
}

pub(crate) fn sort_files(files: &mut [MediaFile]) {
    files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
}

pub(crate) fn sort_transcriptions(transcriptions: &mut [Transcription]) {
    transcriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

pub(crate) fn sort_questions(questions: &mut [Question]) {
    questions.sort_by(|a, b| {
        a.segment_index
            .cmp(&b.segment_index)
            .then(a.created_at.cmp(&b.created_at))
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::types::{
        Difficulty, FileStatus, QuestionOption, Segment, TranscriptionStatus,
    };

    pub fn media_file(name: &str, age_secs: i64) -> MediaFile {
        let at = Utc::now() - Duration::seconds(age_secs);
        MediaFile {
            id: Uuid::new_v4(),
            original_name: name.to_string(),
            filename: format!("video-{name}"),
            path: format!("/tmp/{name}").into(),
            size: 42,
            mime_type: "audio/mpeg".to_string(),
            uploaded_at: at,
            status: FileStatus::Uploaded,
            status_updated_at: at,
        }
    }

    pub fn transcription(file_id: Uuid) -> Transcription {
        Transcription {
            id: Uuid::new_v4(),
            file_id,
            full_transcript: "a b".to_string(),
            segments: vec![Segment {
                start_time: 0.0,
                end_time: 10.0,
                text: "a b".to_string(),
                segment_index: 0,
            }],
            duration: 10.0,
            language: None,
            created_at: Utc::now(),
            status: TranscriptionStatus::Completed,
        }
    }

    pub fn question(transcription_id: Uuid, segment_index: u32) -> Question {
        Question {
            id: Uuid::new_v4(),
            transcription_id,
            segment_index,
            question: "What?".to_string(),
            options: vec![
                QuestionOption::new("this", true),
                QuestionOption::new("that", false),
            ],
            explanation: None,
            difficulty: Difficulty::Easy,
            created_at: Utc::now(),
        }
    }

    /// Behavior every backend must share.
    pub async fn exercise_store(store: &dyn Store) {
        let old = store.insert_file(media_file("old.mp3", 60)).await.unwrap();
        let new = store.insert_file(media_file("new.mp3", 0)).await.unwrap();

        let files = store.list_files().await.unwrap();
        assert_eq!(
            files.iter().map(|f| f.id).collect::<Vec<_>>(),
            vec![new.id, old.id]
        );

        let updated = store
            .set_file_status(old.id, FileStatus::Processing)
            .await
            .unwrap();
        assert_eq!(updated.status, FileStatus::Processing);
        assert!(updated.status_updated_at >= old.status_updated_at);

        let t = store.insert_transcription(transcription(old.id)).await.unwrap();
        assert_eq!(
            store.find_transcription_by_file(old.id).await.unwrap(),
            Some(t.clone())
        );
        assert_eq!(store.find_transcription_by_file(new.id).await.unwrap(), None);

        let q1 = store.insert_question(question(t.id, 1)).await.unwrap();
        let q0 = store.insert_question(question(t.id, 0)).await.unwrap();
        let listed = store.list_questions(t.id, None).await.unwrap();
        assert_eq!(
            listed.iter().map(|q| q.id).collect::<Vec<_>>(),
            vec![q0.id, q1.id]
        );
        assert_eq!(store.list_questions(t.id, Some(1)).await.unwrap(), vec![q1.clone()]);

        let mut edited = q1.clone();
        edited.question = "Why?".to_string();
        store.update_question(edited).await.unwrap();
        assert_eq!(store.get_question(q1.id).await.unwrap().question, "Why?");

        assert_eq!(store.delete_questions_for_transcription(t.id).await.unwrap(), 2);
        assert!(store.get_question(q0.id).await.unwrap_err().is_not_found());

        store.delete_transcription(t.id).await.unwrap();
        assert!(store.get_transcription(t.id).await.unwrap_err().is_not_found());

        store.delete_file(old.id).await.unwrap();
        assert!(store.get_file(old.id).await.unwrap_err().is_not_found());
        assert!(store.delete_file(old.id).await.unwrap_err().is_not_found());
        assert!(
            store
                .set_file_status(Uuid::new_v4(), FileStatus::Failed)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }
}
