use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use mediaquiz_core::{NewQuestion, Question, QuestionStats, QuestionUpdate};
use serde_json::{Value, json};

use crate::api::{
    AppState,
    error::{ApiResult, parse_id, parse_segment_index},
};

pub async fn for_transcription(
    State(state): State<Arc<AppState>>,
    Path(transcription_id): Path<String>,
) -> ApiResult<Json<Vec<Question>>> {
    let transcription_id = parse_id("Transcription", &transcription_id)?;
    Ok(Json(state.service.questions(transcription_id, None).await?))
}

pub async fn for_segment(
    State(state): State<Arc<AppState>>,
    Path((transcription_id, segment_index)): Path<(String, String)>,
) -> ApiResult<Json<Vec<Question>>> {
    let transcription_id = parse_id("Transcription", &transcription_id)?;
    let segment_index = parse_segment_index(&segment_index)?;
    Ok(Json(
        state
            .service
            .questions(transcription_id, Some(segment_index))
            .await?,
    ))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(transcription_id): Path<String>,
) -> ApiResult<Json<QuestionStats>> {
    let transcription_id = parse_id("Transcription", &transcription_id)?;
    Ok(Json(state.service.question_stats(transcription_id).await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Question>> {
    let id = parse_id("Question", &id)?;
    Ok(Json(state.service.question(id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewQuestion>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Question>)> {
    let Json(new) = body?;
    let question = state.service.create_question(new).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<QuestionUpdate>, JsonRejection>,
) -> ApiResult<Json<Question>> {
    let id = parse_id("Question", &id)?;
    let Json(update) = body?;
    Ok(Json(state.service.update_question(id, update).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id("Question", &id)?;
    state.service.delete_question(id).await?;
    Ok(Json(json!({ "message": "Question deleted successfully" })))
}
