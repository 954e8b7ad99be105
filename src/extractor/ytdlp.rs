//! yt-dlp metadata tier
//!
//! Runs yt-dlp in metadata-only mode (`--dump-json --no-download`) and maps
//! its JSON output onto a [`MetadataPatch`].

use crate::extractor::models::{FormatDescriptor, MetadataPatch};
use crate::extractor::traits::MetadataSource;
use crate::resolver::VideoReference;
use crate::utils::error::LoopError;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, error};

/// Subset of the yt-dlp info JSON we care about
#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpInfo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub formats: Option<Vec<YtDlpFormat>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpFormat {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub url: Option<String>,
    pub format_note: Option<String>,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

impl YtDlpFormat {
    /// Muxed formats carry both streams; missing codec info counts as present
    fn is_muxed(&self) -> bool {
        self.vcodec.as_deref() != Some("none") && self.acodec.as_deref() != Some("none")
    }

    fn descriptor(&self) -> FormatDescriptor {
        let quality_label = self
            .format_note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| self.height.map(|h| format!("{}p", h)))
            .unwrap_or_else(|| "Unknown".to_string());

        FormatDescriptor {
            quality_label,
            container: self.ext.clone().unwrap_or_else(|| "mp4".to_string()),
            approx_size_bytes: self
                .filesize
                .or(self.filesize_approx)
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(|s| s as u64),
            source_url: self.url.clone(),
        }
    }
}

impl From<YtDlpInfo> for MetadataPatch {
    fn from(info: YtDlpInfo) -> Self {
        let formats = info.formats.map(|formats| {
            let mut muxed: Vec<&YtDlpFormat> = formats.iter().filter(|f| f.is_muxed()).collect();
            // Highest resolution first; stable so yt-dlp's own order breaks ties
            muxed.sort_by(|a, b| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)));
            muxed.into_iter().map(YtDlpFormat::descriptor).collect::<Vec<_>>()
        });

        MetadataPatch {
            title: info.title,
            description: info.description,
            thumbnail_url: info.thumbnail,
            duration_seconds: info.duration,
            author_name: info.uploader.or(info.channel),
            view_count: info.view_count,
            like_count: info.like_count,
            comment_count: info.comment_count,
            tags: info.tags,
            formats,
        }
        .normalized()
    }
}

/// Parse the output of `yt-dlp --dump-json`
pub fn parse_dump(json: &str) -> Result<MetadataPatch> {
    let info: YtDlpInfo = serde_json::from_str(json.trim())?;
    Ok(info.into())
}

/// Metadata tier backed by the yt-dlp CLI
pub struct YtDlpSource {
    ytdlp_path: PathBuf,
    timeout: Duration,
}

impl YtDlpSource {
    pub fn new(ytdlp_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            timeout,
        }
    }

    pub fn ytdlp_path(&self) -> &Path {
        &self.ytdlp_path
    }
}

#[async_trait]
impl MetadataSource for YtDlpSource {
    fn id(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, video: &VideoReference) -> Result<MetadataPatch> {
        debug!("Extracting metadata for URL: {}", video.url);

        let child = AsyncCommand::new(&self.ytdlp_path)
            .arg("--dump-json")
            .arg("--no-download")
            .arg("--no-warnings")
            .arg("--no-check-certificate")
            .arg("--prefer-free-formats")
            .arg(&video.url)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                LoopError::UpstreamUnavailable(format!(
                    "yt-dlp metadata timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| LoopError::from_spawn("yt-dlp", e))?;

        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            error!("yt-dlp metadata extraction failed: {}", error_msg.trim());
            return Err(LoopError::UpstreamUnavailable(error_msg.trim().to_string()).into());
        }

        let json_str = String::from_utf8(output.stdout)?;
        parse_dump(&json_str)
    }
}
