//! Error handling for loopforge

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for loopforge
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("{tool} failed: {message}")]
    ProcessingError { tool: String, message: String },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} not found. Please install it or set its path in the configuration")]
    ToolNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl LoopError {
    /// Map a spawn failure of an external tool, distinguishing a missing binary
    pub fn from_spawn(tool: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => LoopError::ToolNotFound(tool.to_string()),
            _ => LoopError::IoError(err),
        }
    }

    pub fn processing(tool: &str, message: impl Into<String>) -> Self {
        LoopError::ProcessingError {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_maps_to_tool_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let mapped = LoopError::from_spawn("yt-dlp", err);
        assert!(matches!(mapped, LoopError::ToolNotFound(ref t) if t == "yt-dlp"));
    }

    #[test]
    fn test_other_spawn_errors_stay_io() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            LoopError::from_spawn("ffmpeg", err),
            LoopError::IoError(_)
        ));
    }

    #[test]
    fn test_processing_error_message_carries_tool_text() {
        let err = LoopError::processing("ffmpeg", "Invalid data found when processing input");
        assert_eq!(
            err.to_string(),
            "ffmpeg failed: Invalid data found when processing input"
        );
    }
}
