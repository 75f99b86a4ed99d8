use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{MediaQuizError, Result},
    store::{Store, sort_files, sort_questions, sort_transcriptions},
    types::{FileStatus, MediaFile, Question, Transcription},
};

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<Uuid, MediaFile>>,
    transcriptions: RwLock<HashMap<Uuid, Transcription>>,
    questions: RwLock<HashMap<Uuid, Question>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn question_count(&self) -> usize {
        self.questions.read().await.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_file(&self, file: MediaFile) -> Result<MediaFile> {
        self.files.write().await.insert(file.id, file.clone());
        Ok(file)
    }

    async fn get_file(&self, id: Uuid) -> Result<MediaFile> {
        self.files
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| MediaQuizError::not_found("File", id))
    }

    async fn list_files(&self) -> Result<Vec<MediaFile>> {
        let mut files: Vec<_> = self.files.read().await.values().cloned().collect();
        sort_files(&mut files);
        Ok(files)
    }

    async fn set_file_status(&self, id: Uuid, status: FileStatus) -> Result<MediaFile> {
        let mut files = self.files.write().await;
        let file = files
            .get_mut(&id)
            .ok_or_else(|| MediaQuizError::not_found("File", id))?;
        file.status = status;
        file.status_updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn delete_file(&self, id: Uuid) -> Result<MediaFile> {
        self.files
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| MediaQuizError::not_found("File", id))
    }

    async fn insert_transcription(&self, transcription: Transcription) -> Result<Transcription> {
        self.transcriptions
            .write()
            .await
            .insert(transcription.id, transcription.clone());
        Ok(transcription)
    }

    async fn get_transcription(&self, id: Uuid) -> Result<Transcription> {
        self.transcriptions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| MediaQuizError::not_found("Transcription", id))
    }

    async fn find_transcription_by_file(&self, file_id: Uuid) -> Result<Option<Transcription>> {
        Ok(self
            .transcriptions
            .read()
            .await
            .values()
            .find(|t| t.file_id == file_id)
            .cloned())
    }

    async fn list_transcriptions(&self) -> Result<Vec<Transcription>> {
        let mut all: Vec<_> = self.transcriptions.read().await.values().cloned().collect();
        sort_transcriptions(&mut all);
        Ok(all)
    }

    async fn delete_transcription(&self, id: Uuid) -> Result<Transcription> {
        self.transcriptions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| MediaQuizError::not_found("Transcription", id))
    }

    async fn insert_question(&self, question: Question) -> Result<Question> {
        self.questions
            .write()
            .await
            .insert(question.id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: Uuid) -> Result<Question> {
        self.questions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| MediaQuizError::not_found("Question", id))
    }

    async fn update_question(&self, question: Question) -> Result<Question> {
        let mut questions = self.questions.write().await;
        let slot = questions
            .get_mut(&question.id)
            .ok_or_else(|| MediaQuizError::not_found("Question", question.id))?;
        *slot = question.clone();
        Ok(question)
    }

    async fn delete_question(&self, id: Uuid) -> Result<Question> {
        self.questions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| MediaQuizError::not_found("Question", id))
    }

    async fn list_questions(
        &self,
        transcription_id: Uuid,
        segment_index: Option<u32>,
    ) -> Result<Vec<Question>> {
        let mut questions: Vec<_> = self
            .questions
            .read()
            .await
            .values()
            .filter(|q| q.transcription_id == transcription_id)
            .filter(|q| segment_index.is_none_or(|idx| q.segment_index == idx))
            .cloned()
            .collect();
        sort_questions(&mut questions);
        Ok(questions)
    }

    async fn delete_questions_for_transcription(&self, transcription_id: Uuid) -> Result<usize> {
        let mut questions = self.questions.write().await;
        let before = questions.len();
        questions.retain(|_, q| q.transcription_id != transcription_id);
        Ok(before - questions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::exercise_store;

    #[tokio::test]
    async fn memory_store_contract() {
        exercise_store(&MemoryStore::new()).await;
    }
}
