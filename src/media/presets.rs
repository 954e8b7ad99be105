//! Encoder presets for conversion and wallpaper export

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Quality levels accepted by `convert`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl ConvertQuality {
    /// Lenient lookup; unknown names fall back to medium
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("medium") => ConvertQuality::Medium,
            Some("low") => ConvertQuality::Low,
            Some("high") => ConvertQuality::High,
            Some(other) => {
                warn!("Unknown conversion quality '{}', using medium", other);
                ConvertQuality::Medium
            }
        }
    }

    /// (x264 preset, crf)
    pub fn encoder_settings(&self) -> (&'static str, u8) {
        match self {
            ConvertQuality::Low => ("ultrafast", 28),
            ConvertQuality::Medium => ("fast", 23),
            ConvertQuality::High => ("medium", 18),
        }
    }
}

/// Target sizes for wallpaper export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl WallpaperSize {
    /// Lenient lookup; unknown names fall back to medium
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("medium") => WallpaperSize::Medium,
            Some("small") => WallpaperSize::Small,
            Some("large") => WallpaperSize::Large,
            Some(other) => {
                warn!("Unknown wallpaper size '{}', using medium", other);
                WallpaperSize::Medium
            }
        }
    }

    pub fn settings(&self) -> WallpaperSettings {
        match self {
            WallpaperSize::Small => WallpaperSettings {
                width: 640,
                height: 360,
                crf: 25,
                fps: 24,
            },
            WallpaperSize::Medium => WallpaperSettings {
                width: 1280,
                height: 720,
                crf: 23,
                fps: 30,
            },
            WallpaperSize::Large => WallpaperSettings {
                width: 1920,
                height: 1080,
                crf: 20,
                fps: 30,
            },
        }
    }
}

/// Encoder settings reported back with a wallpaper export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallpaperSettings {
    pub width: u32,
    pub height: u32,
    pub crf: u8,
    pub fps: u32,
}
