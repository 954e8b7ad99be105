//! Application configuration

use crate::utils::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Shared directory for downloaded and transformed artifacts
    pub output_dir: PathBuf,

    /// Directory for the job ledger
    pub data_dir: PathBuf,

    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// YouTube Data API key; tier 1 of the metadata chain is skipped without it
    pub youtube_api_key: Option<String>,

    /// Tool path overrides
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub browser_path: Option<PathBuf>,

    /// Maximum concurrent extractor processes
    pub max_concurrent: usize,

    /// Hard limit for one yt-dlp metadata dump (seconds)
    pub metadata_timeout_secs: u64,

    /// Hard limit for one yt-dlp download (seconds)
    pub extractor_timeout_secs: u64,

    /// Hard limit for one FFmpeg pipeline (seconds)
    pub transform_timeout_secs: u64,

    /// Hard limit for one headless browser scrape (seconds)
    pub scrape_timeout_secs: u64,

    /// How long the scrape waits for a media element (seconds)
    pub media_wait_secs: u64,

    /// Finished artifacts older than this are evicted (seconds)
    pub artifact_ttl_secs: u64,

    /// Interval between eviction sweeps (seconds)
    pub sweep_interval_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            output_dir: paths::default_output_dir(),
            data_dir: paths::app_data_dir(),
            bind_addr: "127.0.0.1:5000".to_string(),
            youtube_api_key: None,
            ytdlp_path: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            browser_path: None,
            max_concurrent: 3,
            metadata_timeout_secs: 120,
            extractor_timeout_secs: 1800, // 30 minutes
            transform_timeout_secs: 900,
            scrape_timeout_secs: 30,
            media_wait_secs: 10,
            artifact_ttl_secs: 6 * 60 * 60,
            sweep_interval_secs: 10 * 60,
        }
    }
}

impl AppSettings {
    /// Load settings from an optional JSON file, then apply environment overrides
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str::<AppSettings>(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => AppSettings::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok());
        settings.normalize();
        debug!("Effective settings: {:?}", settings);
        Ok(settings)
    }

    /// Apply `LOOPFORGE_*` and `YOUTUBE_API_KEY` overrides from the given lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LOOPFORGE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("LOOPFORGE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("LOOPFORGE_BIND") {
            self.bind_addr = v;
        }
        if let Some(v) = get("YOUTUBE_API_KEY") {
            self.youtube_api_key = Some(v);
        }
        if let Some(v) = get("LOOPFORGE_YTDLP") {
            self.ytdlp_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LOOPFORGE_FFMPEG") {
            self.ffmpeg_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LOOPFORGE_FFPROBE") {
            self.ffprobe_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LOOPFORGE_BROWSER") {
            self.browser_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LOOPFORGE_MAX_CONCURRENT") {
            match v.trim().parse::<usize>() {
                Ok(n) => self.max_concurrent = n,
                Err(e) => warn!("Ignoring LOOPFORGE_MAX_CONCURRENT={}: {}", v, e),
            }
        }
        if let Some(v) = get("LOOPFORGE_ARTIFACT_TTL_SECS") {
            match v.trim().parse::<u64>() {
                Ok(n) => self.artifact_ttl_secs = n,
                Err(e) => warn!("Ignoring LOOPFORGE_ARTIFACT_TTL_SECS={}: {}", v, e),
            }
        }
    }

    /// Enforce sane minimums
    pub fn normalize(&mut self) {
        if self.max_concurrent == 0 {
            self.max_concurrent = 1;
        }
        if self.sweep_interval_secs == 0 {
            self.sweep_interval_secs = 60;
        }
        if self.youtube_api_key.as_deref().map(str::trim) == Some("") {
            self.youtube_api_key = None;
        }
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_secs(self.extractor_timeout_secs)
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_secs(self.transform_timeout_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn media_wait(&self) -> Duration {
        Duration::from_secs(self.media_wait_secs)
    }

    pub fn artifact_ttl(&self) -> Duration {
        Duration::from_secs(self.artifact_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
