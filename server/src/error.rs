use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mix_core::MixError;
use serde::Serialize;
use thiserror::Error;
use voice_core::EngineError;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Mix(#[from] MixError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("No synthesis engine configured")]
    EngineUnavailable,

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Mix(e) => {
                let status = match &e {
                    MixError::Validation(_) => StatusCode::BAD_REQUEST,
                    MixError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
                    MixError::Processing(_) => {
                        tracing::error!("Mix processing error: {}", e);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
            ApiError::Engine(e) => {
                tracing::error!("Engine error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::EngineUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "No synthesis engine configured".to_string(),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_error_status_mapping() {
        let resp = ApiError::Mix(MixError::validation("bad")).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError::Mix(MixError::not_found("gone")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError::Mix(MixError::processing("broke")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_engine_unavailable_is_503() {
        let resp = ApiError::EngineUnavailable.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
