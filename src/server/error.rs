use crate::utils::error::LoopError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

const FALLBACK_HINT: &str =
    "Could not fetch video details. Try again later or use a video from a different platform.";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    fallback: bool,
}

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
    fallback: bool,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Bad request",
            message: message.into(),
            fallback: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "Not found",
            message: message.into(),
            fallback: false,
        }
    }

    /// Mark a server-side failure so the client falls back to its own defaults
    pub fn with_fallback(mut self) -> Self {
        if self.status.is_server_error() {
            self.fallback = true;
            self.message = format!("{}. {}", self.message.trim_end_matches('.'), FALLBACK_HINT);
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<LoopError> for ApiError {
    fn from(err: LoopError) -> Self {
        let (status, error) = match &err {
            LoopError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "Invalid URL"),
            LoopError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            LoopError::FileNotFound(_) => (StatusCode::NOT_FOUND, "File not found"),
            LoopError::JobNotFound(_) => (StatusCode::NOT_FOUND, "Download not found"),
            LoopError::ProcessingError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "Processing failed"),
            LoopError::ToolNotFound(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Tool not available"),
            LoopError::UpstreamUnavailable(_) | LoopError::NetworkError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Upstream unavailable")
            }
            LoopError::IoError(_) | LoopError::SerializationError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        };

        Self {
            status,
            error,
            message: err.to_string(),
            fallback: false,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.error,
            message: self.message,
            fallback: self.fallback,
        });
        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (LoopError::InvalidUrl("x".into()), StatusCode::BAD_REQUEST),
            (LoopError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (LoopError::FileNotFound(PathBuf::from("/x")), StatusCode::NOT_FOUND),
            (LoopError::JobNotFound("j".into()), StatusCode::NOT_FOUND),
            (LoopError::processing("ffmpeg", "boom"), StatusCode::INTERNAL_SERVER_ERROR),
            (LoopError::ToolNotFound("yt-dlp".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_fallback_only_for_server_errors() {
        let client = ApiError::from(LoopError::InvalidUrl("x".into())).with_fallback();
        assert!(!client.fallback);

        let server = ApiError::from(LoopError::UpstreamUnavailable("down".into())).with_fallback();
        assert!(server.fallback);
    }

    #[test]
    fn test_fallback_message_suggests_another_platform() {
        let err = ApiError::from(LoopError::UpstreamUnavailable("quota exceeded".into())).with_fallback();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().starts_with("Upstream unavailable: quota exceeded. "));
        assert!(err.message().contains("different platform"));

        let client = ApiError::from(LoopError::InvalidUrl("x".into())).with_fallback();
        assert!(!client.message().contains("different platform"));
    }

    #[test]
    fn test_processing_message_carries_tool_output() {
        let err = ApiError::from(LoopError::processing("ffmpeg", "moov atom not found"));
        assert!(err.message().contains("moov atom not found"));
    }
}
