//! Request-time operations. Nothing here waits on the pipeline.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{MediaQuizError, Result},
    runtime::Dispatcher,
    store::Store,
    types::{
        FileStatus, MediaFile, NewQuestion, Question, QuestionStats, QuestionUpdate, Segment,
        SegmentList, Transcription,
    },
    uploads::{UploadPolicy, UploadStore},
};

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct MediaService {
    store: Arc<dyn Store>,
    uploads: UploadStore,
    dispatcher: Dispatcher,
    policy: UploadPolicy,
}

impl MediaService {
    pub fn new(
        store: Arc<dyn Store>,
        uploads: UploadStore,
        dispatcher: Dispatcher,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            uploads,
            dispatcher,
            policy,
        }
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Store the bytes, record the file as `uploaded` and hand it to the
    /// pipeline. Returns as soon as the record exists.
    pub async fn upload(&self, request: UploadRequest) -> Result<MediaFile> {
        self.policy
            .check(&request.mime_type, request.bytes.len() as u64)?;

        let stored = self
            .uploads
            .save(&request.original_name, &request.bytes)
            .await?;

        let now = Utc::now();
        let file = MediaFile {
            id: Uuid::new_v4(),
            original_name: request.original_name,
            filename: stored.filename,
            path: stored.path,
            size: request.bytes.len() as u64,
            mime_type: request.mime_type,
            uploaded_at: now,
            status: FileStatus::Uploaded,
            status_updated_at: now,
        };

        let file = match self.store.insert_file(file.clone()).await {
            Ok(file) => file,
            Err(e) => {
                if let Err(cleanup) = self.uploads.remove(&file.path).await {
                    tracing::warn!(path = %file.path.display(), "failed to remove orphaned upload: {cleanup}");
                }
                return Err(e);
            }
        };

        tracing::info!(
            file_id = %file.id,
            name = %file.original_name,
            size = file.size,
            mime_type = %file.mime_type,
            "file uploaded"
        );
        self.dispatcher.submit(file.id);

        Ok(file)
    }

    pub async fn file(&self, id: Uuid) -> Result<MediaFile> {
        self.store.get_file(id).await
    }

    pub async fn files(&self) -> Result<Vec<MediaFile>> {
        self.store.list_files().await
    }

    pub async fn update_file_status(&self, id: Uuid, status: &str) -> Result<MediaFile> {
        let status: FileStatus = status.parse()?;
        self.store.set_file_status(id, status).await
    }

    pub async fn delete_file(&self, id: Uuid) -> Result<()> {
        delete_file_cascade(self.store.as_ref(), &self.uploads, id).await
    }

    pub async fn transcription(&self, id: Uuid) -> Result<Transcription> {
        self.store.get_transcription(id).await
    }

    pub async fn transcription_for_file(&self, file_id: Uuid) -> Result<Transcription> {
        self.store
            .find_transcription_by_file(file_id)
            .await?
            .ok_or_else(|| MediaQuizError::not_found("Transcription", file_id))
    }

    pub async fn transcriptions(&self) -> Result<Vec<Transcription>> {
        self.store.list_transcriptions().await
    }

    pub async fn segments(&self, transcription_id: Uuid) -> Result<SegmentList> {
        let transcription = self.store.get_transcription(transcription_id).await?;
        Ok(SegmentList {
            transcription_id: transcription.id,
            total_segments: transcription.segments.len(),
            segments: transcription.segments,
        })
    }

    pub async fn segment(&self, transcription_id: Uuid, segment_index: u32) -> Result<Segment> {
        let transcription = self.store.get_transcription(transcription_id).await?;
        transcription
            .segments
            .into_iter()
            .find(|s| s.segment_index == segment_index)
            .ok_or_else(|| MediaQuizError::not_found("Segment", segment_index))
    }

    pub async fn questions(
        &self,
        transcription_id: Uuid,
        segment_index: Option<u32>,
    ) -> Result<Vec<Question>> {
        self.store
            .list_questions(transcription_id, segment_index)
            .await
    }

    pub async fn question(&self, id: Uuid) -> Result<Question> {
        self.store.get_question(id).await
    }

    pub async fn create_question(&self, new: NewQuestion) -> Result<Question> {
        let question = new.into_question()?;
        self.store.insert_question(question).await
    }

    pub async fn update_question(&self, id: Uuid, update: QuestionUpdate) -> Result<Question> {
        let existing = self.store.get_question(id).await?;
        let updated = update.apply(existing)?;
        self.store.update_question(updated).await
    }

    pub async fn delete_question(&self, id: Uuid) -> Result<()> {
        self.store.delete_question(id).await.map(|_| ())
    }

    pub async fn question_stats(&self, transcription_id: Uuid) -> Result<QuestionStats> {
        let questions = self.store.list_questions(transcription_id, None).await?;
        Ok(QuestionStats::from_questions(&questions))
    }
}

/// Remove a file with its transcription, questions and stored bytes, in that
/// order. Not atomic: a failure part-way leaves the remaining records.
pub async fn delete_file_cascade(
    store: &dyn Store,
    uploads: &UploadStore,
    file_id: Uuid,
) -> Result<()> {
    let file = store.get_file(file_id).await?;

    if let Some(transcription) = store.find_transcription_by_file(file_id).await? {
        let removed = store
            .delete_questions_for_transcription(transcription.id)
            .await?;
        store.delete_transcription(transcription.id).await?;
        tracing::debug!(
            file_id = %file_id,
            transcription_id = %transcription.id,
            questions = removed,
            "removed transcription and questions"
        );
    }

    store.delete_file(file_id).await?;

    if let Err(e) = uploads.remove(&file.path).await {
        tracing::warn!(file_id = %file_id, path = %file.path.display(), "failed to remove stored upload: {e}");
    }

    tracing::info!(file_id = %file_id, "file deleted");
    Ok(())
}
