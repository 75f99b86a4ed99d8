pub mod error;
mod files;
mod questions;
mod transcriptions;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};
use chrono::Utc;
use mediaquiz_core::MediaService;
use serde_json::{Value, json};
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub struct AppState {
    pub service: MediaService,
}

pub fn router(service: MediaService) -> Router {
    let body_limit = usize::try_from(service.policy().max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let uploads_dir = service.uploads().dir().to_path_buf();
    let state = Arc::new(AppState { service });

    Router::new()
        .route("/health", get(health))
        // Files
        .route("/api/files/upload", post(files::upload))
        .route("/api/files", get(files::list))
        .route("/api/files/:id", get(files::get).delete(files::delete))
        .route("/api/files/:id/status", patch(files::update_status))
        // Transcriptions
        .route("/api/transcription", get(transcriptions::list))
        .route("/api/transcription/file/:file_id", get(transcriptions::by_file))
        .route("/api/transcription/:id", get(transcriptions::get))
        .route("/api/transcription/:id/segments", get(transcriptions::segments))
        .route(
            "/api/transcription/:id/segments/:segment_index",
            get(transcriptions::segment),
        )
        // Questions
        .route("/api/questions", post(questions::create))
        .route(
            "/api/questions/transcription/:transcription_id",
            get(questions::for_transcription),
        )
        .route(
            "/api/questions/transcription/:transcription_id/segment/:segment_index",
            get(questions::for_segment),
        )
        .route(
            "/api/questions/stats/transcription/:transcription_id",
            get(questions::stats),
        )
        .route(
            "/api/questions/:id",
            get(questions::get)
                .put(questions::update)
                .delete(questions::delete),
        )
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "Server is running!",
        "timestamp": Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use mediaquiz_core::{
        FileStatus, MediaFile, MemoryStore, Orchestrator, PipelineRuntime, PipelineSettings,
        Store, UploadPolicy, UploadStore,
        engines::{FakeQuestionEngine, FakeTranscriptionEngine},
    };
    use reqwest::StatusCode;
    use serde_json::Value;

    use super::*;

    struct TestServer {
        base: String,
        client: reqwest::Client,
        _runtime: PipelineRuntime,
        _dir: tempfile::TempDir,
    }

    async fn spawn_server() -> TestServer {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            Arc::new(FakeTranscriptionEngine::new()),
            Arc::new(FakeQuestionEngine::new()),
            PipelineSettings::default(),
        )
        .unwrap();
        let runtime = PipelineRuntime::start(Arc::new(orchestrator), 2).unwrap();
        let uploads = UploadStore::open(dir.path().join("uploads")).await.unwrap();
        let service = MediaService::new(
            store,
            uploads,
            runtime.dispatcher(),
            UploadPolicy::with_max_bytes(1024),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(service)).await.unwrap();
        });

        TestServer {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _runtime: runtime,
            _dir: dir,
        }
    }

    fn multipart_body(mime: &str, bytes: &[u8]) -> (String, Vec<u8>) {
        let boundary = "mediaquiz-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"talk.mp3\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    impl TestServer {
        async fn upload(&self, mime: &str, bytes: &[u8]) -> reqwest::Response {
            let (content_type, body) = multipart_body(mime, bytes);
            self.client
                .post(format!("{}/api/files/upload", self.base))
                .header("Content-Type", content_type)
                .body(body)
                .send()
                .await
                .unwrap()
        }

        async fn get_json(&self, path: &str) -> (StatusCode, Value) {
            let response = self
                .client
                .get(format!("{}{path}", self.base))
                .send()
                .await
                .unwrap();
            let status = response.status();
            (status, response.json().await.unwrap())
        }

        async fn wait_for_status(&self, id: &str, want: &str) -> Value {
            for _ in 0..100 {
                let (_, file) = self.get_json(&format!("/api/files/{id}")).await;
                if file["status"] == want {
                    return file;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            panic!("file {id} never reached {want}");
        }
    }

    #[tokio::test]
    async fn upload_then_query_everything() {
        let server = spawn_server().await;

        let response = server.upload("audio/mpeg", b"ID3 fake").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "File uploaded successfully");
        let file: MediaFile = serde_json::from_value(body["file"].clone()).unwrap();
        assert_eq!(file.status, FileStatus::Uploaded);

        let id = file.id.to_string();
        server.wait_for_status(&id, "completed").await;

        let (status, transcription) = server
            .get_json(&format!("/api/transcription/file/{id}"))
            .await;
        assert_eq!(status, StatusCode::OK);
        let tid = transcription["id"].as_str().unwrap().to_string();

        let (_, segments) = server
            .get_json(&format!("/api/transcription/{tid}/segments"))
            .await;
        assert_eq!(segments["totalSegments"], 2);

        let (status, _) = server
            .get_json(&format!("/api/transcription/{tid}/segments/5"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, questions) = server
            .get_json(&format!("/api/questions/transcription/{tid}/segment/0"))
            .await;
        assert_eq!(questions.as_array().unwrap().len(), 2);

        let (_, stats) = server
            .get_json(&format!("/api/questions/stats/transcription/{tid}"))
            .await;
        assert_eq!(stats["totalQuestions"], 4);
        assert_eq!(stats["segmentBreakdown"]["1"], 2);

        let served = server
            .client
            .get(format!("{}/uploads/{}", server.base, file.filename))
            .send()
            .await
            .unwrap();
        assert_eq!(served.bytes().await.unwrap().as_ref(), b"ID3 fake");

        let deleted = server
            .client
            .delete(format!("{}/api/files/{id}", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);
        let (status, body) = server.get_json(&format!("/api/transcription/{tid}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Transcription not found");
    }

    #[tokio::test]
    async fn upload_rejections_are_client_errors() {
        let server = spawn_server().await;

        let wrong_type = server.upload("application/pdf", b"%PDF").await;
        assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);
        let body: Value = wrong_type.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Invalid file type"));

        let too_big = server.upload("audio/mpeg", &[0u8; 2048]).await;
        assert_eq!(too_big.status(), StatusCode::BAD_REQUEST);

        let (_, files) = server.get_json("/api/files").await;
        assert!(files.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_and_question_validation() {
        let server = spawn_server().await;
        let response = server.upload("audio/wav", b"RIFF").await;
        let body: Value = response.json().await.unwrap();
        let id = body["file"]["id"].as_str().unwrap().to_string();
        server.wait_for_status(&id, "completed").await;

        let bad_status = server
            .client
            .patch(format!("{}/api/files/{id}/status", server.base))
            .json(&json!({ "status": "archived" }))
            .send()
            .await
            .unwrap();
        assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);

        let no_correct = server
            .client
            .post(format!("{}/api/questions", server.base))
            .json(&json!({
                "transcriptionId": uuid::Uuid::new_v4(),
                "segmentIndex": 0,
                "question": "Pick one",
                "options": [
                    { "text": "a", "isCorrect": false },
                    { "text": "b", "isCorrect": false }
                ]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(no_correct.status(), StatusCode::BAD_REQUEST);
        let body: Value = no_correct.json().await.unwrap();
        assert_eq!(body["error"], "At least one option must be marked as correct");

        let malformed = server
            .client
            .post(format!("{}/api/questions", server.base))
            .header("Content-Type", "application/json")
            .body("{\"question\":")
            .send()
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let (status, _) = server.get_json("/api/files/not-a-uuid").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
