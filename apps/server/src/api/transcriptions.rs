use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use mediaquiz_core::{Segment, SegmentList, Transcription};

use crate::api::{
    AppState,
    error::{ApiResult, parse_id, parse_segment_index},
};

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Transcription>>> {
    Ok(Json(state.service.transcriptions().await?))
}

pub async fn by_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<Transcription>> {
    let file_id = parse_id("Transcription", &file_id)?;
    Ok(Json(state.service.transcription_for_file(file_id).await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Transcription>> {
    let id = parse_id("Transcription", &id)?;
    Ok(Json(state.service.transcription(id).await?))
}

pub async fn segments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SegmentList>> {
    let id = parse_id("Transcription", &id)?;
    Ok(Json(state.service.segments(id).await?))
}

pub async fn segment(
    State(state): State<Arc<AppState>>,
    Path((id, segment_index)): Path<(String, String)>,
) -> ApiResult<Json<Segment>> {
    let id = parse_id("Transcription", &id)?;
    let segment_index = parse_segment_index(&segment_index)?;
    Ok(Json(state.service.segment(id, segment_index).await?))
}
