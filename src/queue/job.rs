//! Download job records and the status report sent to clients

use crate::downloader::{DownloadFormat, DownloadQuality};
use crate::resolver::PlatformKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Immutable description of one download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub job_id: String,
    pub url: String,
    pub platform: PlatformKind,
    pub platform_video_id: String,
    pub format: DownloadFormat,
    pub quality: DownloadQuality,
    pub output_template: PathBuf,
    /// Resolved yt-dlp selector
    pub selection: String,
    pub created_at: DateTime<Utc>,
}

impl DownloadJob {
    /// `<platform>_<videoId>_<jobId>`; every artifact name starts with this
    pub fn file_stem(&self) -> String {
        artifact_stem(self.platform, &self.platform_video_id, &self.job_id)
    }
}

pub fn artifact_stem(platform: PlatformKind, video_id: &str, job_id: &str) -> String {
    format!("{}_{}_{}", platform, video_id, job_id)
}

/// Job lifecycle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed(_) | JobState::Cancelled
        )
    }
}

/// Registry entry: the job plus everything the supervisor learned about it
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job: DownloadJob,
    pub state: JobState,
    pub progress: f64,
    pub artifact: Option<PathBuf>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(job: DownloadJob) -> Self {
        let updated_at = job.created_at;
        Self {
            job,
            state: JobState::Queued,
            progress: 0.0,
            artifact: None,
            updated_at,
        }
    }

    pub fn transition(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
    }
}

/// Returned by `start_download`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTicket {
    pub download_id: String,
    pub status: String,
    pub platform: PlatformKind,
    pub video_id: String,
    pub format: DownloadFormat,
    pub quality: DownloadQuality,
}

/// Wire status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// Status report polled by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub download_id: String,
    pub platform: PlatformKind,
    pub status: WireStatus,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusReport {
    pub fn processing(download_id: &str, platform: PlatformKind, progress: f64) -> Self {
        Self {
            download_id: download_id.to_string(),
            platform,
            status: WireStatus::Processing,
            progress,
            file_name: None,
            size: None,
            download_url: None,
            error: None,
        }
    }

    pub fn completed(download_id: &str, platform: PlatformKind, file_name: String, size: u64) -> Self {
        Self {
            download_url: Some(format!("/uploads/{}", file_name)),
            file_name: Some(file_name),
            size: Some(size),
            status: WireStatus::Completed,
            progress: 100.0,
            ..Self::processing(download_id, platform, 100.0)
        }
    }

    pub fn failed(download_id: &str, platform: PlatformKind, progress: f64, error: String) -> Self {
        Self {
            status: WireStatus::Failed,
            error: Some(error),
            ..Self::processing(download_id, platform, progress)
        }
    }

    pub fn cancelled(download_id: &str, platform: PlatformKind, progress: f64) -> Self {
        Self {
            status: WireStatus::Cancelled,
            ..Self::processing(download_id, platform, progress)
        }
    }
}
