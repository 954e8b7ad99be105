//! Requested format/quality and the yt-dlp selector they map to

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    Video,
    Audio,
    #[default]
    #[serde(alias = "videoAndAudio")]
    VideoAndAudio,
}

impl DownloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadFormat::Video => "video",
            DownloadFormat::Audio => "audio",
            DownloadFormat::VideoAndAudio => "videoandaudio",
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(DownloadFormat::Video),
            "audio" => Ok(DownloadFormat::Audio),
            "videoandaudio" => Ok(DownloadFormat::VideoAndAudio),
            other => Err(format!(
                "unknown format '{}', expected video, audio or videoandaudio",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadQuality {
    Low,
    Medium,
    High,
    #[default]
    Highest,
}

impl DownloadQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadQuality::Low => "low",
            DownloadQuality::Medium => "medium",
            DownloadQuality::High => "high",
            DownloadQuality::Highest => "highest",
        }
    }
}

impl fmt::Display for DownloadQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(DownloadQuality::Low),
            "medium" => Ok(DownloadQuality::Medium),
            "high" => Ok(DownloadQuality::High),
            "highest" => Ok(DownloadQuality::Highest),
            other => Err(format!(
                "unknown quality '{}', expected low, medium, high or highest",
                other
            )),
        }
    }
}

/// Resolved yt-dlp format selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSelection {
    pub selector: String,
    /// Audio downloads are post-processed to mp3
    pub extract_audio: bool,
}

impl FormatSelection {
    /// Map a (format, quality) pair through the selector table
    pub fn resolve(format: DownloadFormat, quality: DownloadQuality) -> Self {
        let selector = match (format, quality) {
            (DownloadFormat::Audio, DownloadQuality::Low) => "worstaudio",
            (DownloadFormat::Audio, DownloadQuality::Medium) => "bestaudio[abr<=128]",
            (DownloadFormat::Audio, DownloadQuality::High) => "bestaudio[abr<=256]",
            (DownloadFormat::Audio, DownloadQuality::Highest) => "bestaudio/best",
            (_, DownloadQuality::Low) => "worst[height>=360]/worst",
            (_, DownloadQuality::Medium) => "best[height<=720]/best",
            (_, DownloadQuality::High) | (_, DownloadQuality::Highest) => "best[height<=1080]/best",
        };

        Self {
            selector: selector.to_string(),
            extract_audio: format == DownloadFormat::Audio,
        }
    }

    /// The `-f ...` (and audio extraction) arguments for yt-dlp
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-f".to_string(), self.selector.clone()];
        if self.extract_audio {
            args.extend(["-x", "--audio-format", "mp3"].map(String::from));
        }
        args
    }
}
