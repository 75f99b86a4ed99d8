use axum::{
    Json,
    extract::rejection::JsonRejection,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mediaquiz_core::MediaQuizError;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug)]
pub enum ApiError {
    Core(MediaQuizError),
    /// Request could not be decoded.
    BadRequest(String),
    /// Rejection raised by an extractor, carrying its own status.
    Rejected { status: StatusCode, message: String },
}

impl From<MediaQuizError> for ApiError {
    fn from(err: MediaQuizError) -> Self {
        ApiError::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Rejected {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Core(MediaQuizError::Validation(message)) => {
                (StatusCode::BAD_REQUEST, message)
            }
            ApiError::Core(MediaQuizError::NotFound { entity, .. }) => {
                (StatusCode::NOT_FOUND, format!("{entity} not found"))
            }
            ApiError::Core(err) => {
                tracing::error!("request failed: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Rejected { status, message } => (status, message),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Ids that do not parse cannot name an existing record.
pub fn parse_id(entity: &'static str, raw: &str) -> ApiResult<Uuid> {
    raw.parse()
        .map_err(|_| MediaQuizError::not_found(entity, raw).into())
}

pub fn parse_segment_index(raw: &str) -> ApiResult<u32> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid segment index".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn maps_core_errors_to_statuses() {
        assert_eq!(
            status_of(MediaQuizError::validation("Invalid status")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(MediaQuizError::not_found("File", "x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(MediaQuizError::Persistence("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(MediaQuizError::QuestionGenerationFailed {
                reason: "x".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn malformed_ids_are_not_found() {
        let err = parse_id("File", "not-a-uuid").unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        assert!(parse_segment_index("-1").is_err());
        assert_eq!(parse_segment_index("3").unwrap(), 3);
    }
}
