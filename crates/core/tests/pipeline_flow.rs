use std::{sync::Arc, time::Duration};

use chrono::Utc;
use mediaquiz_core::{
    Config, FileStatus, MediaFile, MediaQuizError, MediaService, MemoryStore, NewQuestion,
    Orchestrator, PipelineReport, PipelineRuntime, PipelineSettings, QuestionOption,
    QuestionUpdate, RecoveryAction, RecoverySettings, Segment, Store, Transcription,
    TranscriptionStatus, UploadPolicy, UploadRequest, UploadStore,
    engines::{FakeQuestionEngine, FakeTranscriptionEngine},
    recover_stale_files,
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

struct Harness {
    service: MediaService,
    store: Arc<dyn Store>,
    runtime: PipelineRuntime,
    reports: UnboundedReceiver<PipelineReport>,
    dir: TempDir,
}

async fn harness_with(
    transcriber: FakeTranscriptionEngine,
    questions: FakeQuestionEngine,
    policy: UploadPolicy,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        Arc::new(transcriber),
        Arc::new(questions),
        PipelineSettings::default(),
    )
    .unwrap();
    let (runtime, reports) = PipelineRuntime::start_observed(Arc::new(orchestrator), 2).unwrap();
    let uploads = UploadStore::open(dir.path().join("uploads")).await.unwrap();
    let service = MediaService::new(Arc::clone(&store), uploads, runtime.dispatcher(), policy);

    Harness {
        service,
        store,
        runtime,
        reports,
        dir,
    }
}

async fn harness(transcriber: FakeTranscriptionEngine, questions: FakeQuestionEngine) -> Harness {
    harness_with(transcriber, questions, UploadPolicy::default()).await
}

fn lecture() -> UploadRequest {
    UploadRequest {
        original_name: "lecture.mp3".to_string(),
        mime_type: "audio/mpeg".to_string(),
        bytes: b"not really audio".to_vec(),
    }
}

async fn next_report(reports: &mut UnboundedReceiver<PipelineReport>) -> PipelineReport {
    tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("pipeline did not report in time")
        .expect("report channel closed")
}

fn upload_count(h: &Harness) -> usize {
    std::fs::read_dir(h.dir.path().join("uploads")).unwrap().count()
}

#[tokio::test]
async fn upload_returns_uploaded_and_pipeline_completes() {
    let mut h = harness(FakeTranscriptionEngine::new(), FakeQuestionEngine::new()).await;

    let file = h.service.upload(lecture()).await.unwrap();
    assert_eq!(file.status, FileStatus::Uploaded);
    assert!(file.filename.starts_with("video-") && file.filename.ends_with(".mp3"));

    let PipelineReport::Completed(summary) = next_report(&mut h.reports).await else {
        panic!("expected completion");
    };
    assert_eq!(summary.file_id, file.id);

    assert_eq!(h.service.file(file.id).await.unwrap().status, FileStatus::Completed);

    let transcription = h.service.transcription_for_file(file.id).await.unwrap();
    assert_eq!(transcription.status, TranscriptionStatus::Completed);
    assert_eq!(transcription.duration, 600.0);

    let segments = h.service.segments(transcription.id).await.unwrap();
    assert_eq!(segments.total_segments, 2);
    assert_eq!(segments.segments[0].end_time, segments.segments[1].start_time);

    let stats = h.service.question_stats(transcription.id).await.unwrap();
    assert_eq!(stats.total_questions, 4);
    assert_eq!(stats.difficulty_breakdown.easy, 2);
    assert_eq!(stats.difficulty_breakdown.medium, 2);
    assert_eq!(stats.segment_breakdown.get(&0), Some(&2));
    assert_eq!(stats.segment_breakdown.get(&1), Some(&2));

    assert!(h.runtime.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn transcription_failure_marks_file_failed_without_transcription() {
    let mut h = harness(
        FakeTranscriptionEngine::new().with_failure("unsupported codec"),
        FakeQuestionEngine::new(),
    )
    .await;

    let file = h.service.upload(lecture()).await.unwrap();

    let PipelineReport::Failed { file_id, stage, .. } = next_report(&mut h.reports).await else {
        panic!("expected failure");
    };
    assert_eq!(file_id, Some(file.id));
    assert_eq!(stage, "transcribe");

    assert_eq!(h.service.file(file.id).await.unwrap().status, FileStatus::Failed);
    let err = h.service.transcription_for_file(file.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(h.service.transcriptions().await.unwrap().is_empty());
}

#[tokio::test]
async fn one_failing_segment_keeps_questions_for_the_others() {
    let mut h = harness(
        FakeTranscriptionEngine::new(),
        FakeQuestionEngine::new().failing_on("final segment"),
    )
    .await;

    let file = h.service.upload(lecture()).await.unwrap();
    let PipelineReport::Completed(summary) = next_report(&mut h.reports).await else {
        panic!("expected completion");
    };
    assert_eq!(summary.failed_segments, vec![1]);

    assert_eq!(h.service.file(file.id).await.unwrap().status, FileStatus::Completed);

    let t = h.service.transcription_for_file(file.id).await.unwrap();
    assert_eq!(h.service.questions(t.id, Some(0)).await.unwrap().len(), 2);
    assert!(h.service.questions(t.id, Some(1)).await.unwrap().is_empty());
    assert_eq!(h.service.questions(t.id, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_a_file_removes_everything_it_owns() {
    let mut h = harness(FakeTranscriptionEngine::new(), FakeQuestionEngine::new()).await;

    let file = h.service.upload(lecture()).await.unwrap();
    next_report(&mut h.reports).await;

    let t = h.service.transcription_for_file(file.id).await.unwrap();
    let question_ids: Vec<_> = h
        .service
        .questions(t.id, None)
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.id)
        .collect();
    assert_eq!(question_ids.len(), 4);
    assert_eq!(upload_count(&h), 1);

    h.service.delete_file(file.id).await.unwrap();

    assert!(h.service.file(file.id).await.unwrap_err().is_not_found());
    assert!(h.service.transcription(t.id).await.unwrap_err().is_not_found());
    for id in question_ids {
        assert!(h.service.question(id).await.unwrap_err().is_not_found());
    }
    assert_eq!(upload_count(&h), 0);

    assert!(h.service.delete_file(file.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn refetching_a_transcription_is_byte_identical() {
    let mut h = harness(FakeTranscriptionEngine::new(), FakeQuestionEngine::new()).await;

    let file = h.service.upload(lecture()).await.unwrap();
    next_report(&mut h.reports).await;

    let t = h.service.transcription_for_file(file.id).await.unwrap();
    let first = serde_json::to_vec(&h.service.transcription(t.id).await.unwrap().segments).unwrap();
    let second = serde_json::to_vec(&h.service.transcription(t.id).await.unwrap().segments).unwrap();
    assert_eq!(first, second);

    let segment = h.service.segment(t.id, 1).await.unwrap();
    assert_eq!(segment.segment_index, 1);
    assert!(h.service.segment(t.id, 7).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn rejected_uploads_leave_no_trace() {
    let h = harness_with(
        FakeTranscriptionEngine::new(),
        FakeQuestionEngine::new(),
        UploadPolicy::with_max_bytes(8),
    )
    .await;

    let wrong_type = UploadRequest {
        mime_type: "application/pdf".to_string(),
        bytes: b"%PDF".to_vec(),
        ..lecture()
    };
    let empty = UploadRequest {
        bytes: Vec::new(),
        ..lecture()
    };
    let oversize = UploadRequest {
        bytes: vec![0u8; 9],
        ..lecture()
    };

    for request in [wrong_type, empty, oversize] {
        let err = h.service.upload(request).await.unwrap_err();
        assert!(matches!(err, MediaQuizError::Validation(_)), "{err}");
    }

    assert!(h.service.files().await.unwrap().is_empty());
    assert_eq!(upload_count(&h), 0);
}

#[tokio::test]
async fn status_updates_accept_only_known_states() {
    let mut h = harness(FakeTranscriptionEngine::new(), FakeQuestionEngine::new()).await;
    let file = h.service.upload(lecture()).await.unwrap();
    next_report(&mut h.reports).await;

    let err = h
        .service
        .update_file_status(file.id, "finished")
        .await
        .unwrap_err();
    assert!(matches!(err, MediaQuizError::Validation(_)));

    let updated = h.service.update_file_status(file.id, "failed").await.unwrap();
    assert_eq!(updated.status, FileStatus::Failed);

    let missing = h
        .service
        .update_file_status(Uuid::new_v4(), "failed")
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn direct_question_edits_are_validated() {
    let h = harness(FakeTranscriptionEngine::new(), FakeQuestionEngine::new()).await;
    let transcription_id = Uuid::new_v4();

    let all_wrong = NewQuestion {
        transcription_id,
        segment_index: 0,
        question: "Which is right?".to_string(),
        options: vec![
            QuestionOption::new("a", false),
            QuestionOption::new("b", false),
        ],
        explanation: None,
        difficulty: None,
    };
    let err = h.service.create_question(all_wrong.clone()).await.unwrap_err();
    assert!(matches!(err, MediaQuizError::Validation(_)));

    let single = NewQuestion {
        options: vec![QuestionOption::new("a", true)],
        ..all_wrong.clone()
    };
    assert!(matches!(
        h.service.create_question(single).await.unwrap_err(),
        MediaQuizError::Validation(_)
    ));

    let valid = NewQuestion {
        options: vec![
            QuestionOption::new("a", true),
            QuestionOption::new("b", false),
        ],
        ..all_wrong
    };
    let created = h.service.create_question(valid).await.unwrap();

    let updated = h
        .service
        .update_question(
            created.id,
            QuestionUpdate {
                question: Some("Which one is right?".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.question, "Which one is right?");

    let rejected = h
        .service
        .update_question(
            created.id,
            QuestionUpdate {
                options: Some(vec![QuestionOption::new("only", true)]),
                ..Default::default()
            },
        )
        .await;
    assert!(rejected.is_err());
    assert_eq!(h.service.question(created.id).await.unwrap().options.len(), 2);

    h.service.delete_question(created.id).await.unwrap();
    assert!(h.service.question(created.id).await.unwrap_err().is_not_found());
}

fn stuck_file(status: FileStatus, age_secs: i64) -> MediaFile {
    let at = Utc::now() - chrono::Duration::seconds(age_secs);
    MediaFile {
        id: Uuid::new_v4(),
        original_name: "old.mp3".to_string(),
        filename: "video-old.mp3".to_string(),
        path: "/nonexistent/video-old.mp3".into(),
        size: 1,
        mime_type: "audio/mpeg".to_string(),
        uploaded_at: at,
        status,
        status_updated_at: at,
    }
}

fn orphan_transcription(file_id: Uuid) -> Transcription {
    Transcription {
        id: Uuid::new_v4(),
        file_id,
        full_transcript: "partial".to_string(),
        segments: vec![Segment {
            start_time: 0.0,
            end_time: 5.0,
            text: "partial".to_string(),
            segment_index: 0,
        }],
        duration: 5.0,
        language: None,
        created_at: Utc::now(),
        status: TranscriptionStatus::Completed,
    }
}

#[tokio::test]
async fn recovery_retries_stale_and_queued_files() {
    let mut h = harness(FakeTranscriptionEngine::new(), FakeQuestionEngine::new()).await;

    let stale = h
        .store
        .insert_file(stuck_file(FileStatus::Processing, 7200))
        .await
        .unwrap();
    let orphan = h
        .store
        .insert_transcription(orphan_transcription(stale.id))
        .await
        .unwrap();
    let queued = h
        .store
        .insert_file(stuck_file(FileStatus::Uploaded, 10))
        .await
        .unwrap();
    let fresh = h
        .store
        .insert_file(stuck_file(FileStatus::Processing, 5))
        .await
        .unwrap();

    let report = recover_stale_files(
        h.store.as_ref(),
        &h.runtime.dispatcher(),
        RecoverySettings {
            stale_after: Duration::from_secs(3600),
            action: RecoveryAction::Retry,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.resubmitted.len(), 2);
    assert!(report.resubmitted.contains(&stale.id));
    assert!(report.resubmitted.contains(&queued.id));
    assert!(report.failed.is_empty());

    let mut completed = Vec::new();
    for _ in 0..2 {
        match next_report(&mut h.reports).await {
            PipelineReport::Completed(summary) => completed.push(summary.file_id),
            other => panic!("unexpected report {other:?}"),
        }
    }
    assert!(completed.contains(&stale.id));
    assert!(completed.contains(&queued.id));

    assert!(h.store.get_transcription(orphan.id).await.unwrap_err().is_not_found());
    let replacement = h.service.transcription_for_file(stale.id).await.unwrap();
    assert_ne!(replacement.id, orphan.id);

    assert_eq!(
        h.service.file(fresh.id).await.unwrap().status,
        FileStatus::Processing
    );
}

#[tokio::test]
async fn recovery_can_fail_stale_files_instead() {
    let h = harness(FakeTranscriptionEngine::new(), FakeQuestionEngine::new()).await;

    let stale = h
        .store
        .insert_file(stuck_file(FileStatus::Processing, 60))
        .await
        .unwrap();

    let report = recover_stale_files(
        h.store.as_ref(),
        &h.runtime.dispatcher(),
        RecoverySettings {
            stale_after: Duration::ZERO,
            action: RecoveryAction::Fail,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.failed, vec![stale.id]);
    assert!(report.resubmitted.is_empty());
    assert_eq!(h.service.file(stale.id).await.unwrap().status, FileStatus::Failed);
}

#[tokio::test]
async fn default_recovery_restarts_files_interrupted_moments_ago() {
    let mut h = harness(FakeTranscriptionEngine::new(), FakeQuestionEngine::new()).await;

    let interrupted = h
        .store
        .insert_file(stuck_file(FileStatus::Processing, 1))
        .await
        .unwrap();

    let report = recover_stale_files(
        h.store.as_ref(),
        &h.runtime.dispatcher(),
        Config::default().recovery_settings(),
    )
    .await
    .unwrap();

    assert_eq!(report.resubmitted, vec![interrupted.id]);
    match next_report(&mut h.reports).await {
        PipelineReport::Completed(summary) => assert_eq!(summary.file_id, interrupted.id),
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(
        h.service.file(interrupted.id).await.unwrap().status,
        FileStatus::Completed
    );
}

#[tokio::test]
async fn concurrent_uploads_all_finish() {
    let mut h = harness(
        FakeTranscriptionEngine::new().with_delay(Duration::from_millis(20)),
        FakeQuestionEngine::new(),
    )
    .await;

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(h.service.upload(lecture()).await.unwrap().id);
    }

    let mut done = Vec::new();
    for _ in 0..5 {
        done.push(next_report(&mut h.reports).await.file_id().unwrap());
    }
    done.sort();
    ids.sort();
    assert_eq!(done, ids);

    for file in h.service.files().await.unwrap() {
        assert_eq!(file.status, FileStatus::Completed);
    }
}
