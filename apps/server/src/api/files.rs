use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
};
use mediaquiz_core::{MediaFile, MediaQuizError, UploadRequest};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::{
    AppState,
    error::{ApiResult, parse_id},
};

/// Multipart field carrying the media file.
const UPLOAD_FIELD: &str = "video";

pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut multipart = multipart?;

    let mut request = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        request = Some(UploadRequest {
            original_name,
            mime_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let request = request.ok_or_else(|| MediaQuizError::validation("No file uploaded"))?;
    let file = state.service.upload(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "File uploaded successfully",
            "file": file,
        })),
    ))
}

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<MediaFile>>> {
    Ok(Json(state.service.files().await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MediaFile>> {
    let id = parse_id("File", &id)?;
    Ok(Json(state.service.file(id).await?))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Json<MediaFile>> {
    let id = parse_id("File", &id)?;
    let Json(body) = body?;
    Ok(Json(state.service.update_file_status(id, &body.status).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id("File", &id)?;
    state.service.delete_file(id).await?;
    Ok(Json(json!({ "message": "File deleted successfully" })))
}
