//! Platform and video reference types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported social-video platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    YouTube,
    Facebook,
    Instagram,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 3] = [
        PlatformKind::YouTube,
        PlatformKind::Facebook,
        PlatformKind::Instagram,
    ];

    /// Lowercase identifier used in file names and routes
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::YouTube => "youtube",
            PlatformKind::Facebook => "facebook",
            PlatformKind::Instagram => "instagram",
        }
    }

    /// Human-readable name for placeholders and messages
    pub fn label(&self) -> &'static str {
        match self {
            PlatformKind::YouTube => "YouTube",
            PlatformKind::Facebook => "Facebook",
            PlatformKind::Instagram => "Instagram",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlatformKind::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown platform: {}", s))
    }
}

/// A validated URL together with its platform and platform-specific id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoReference {
    pub url: String,
    pub platform: PlatformKind,
    pub platform_video_id: String,
}
