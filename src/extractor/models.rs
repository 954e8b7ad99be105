//! Data structures for video metadata

use crate::resolver::{PlatformKind, VideoReference};
use serde::{Deserialize, Serialize};

/// Normalized metadata record returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: String,
    pub platform: PlatformKind,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<f64>,
    pub author_name: String,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub available_formats: Vec<FormatDescriptor>,
    /// Ids of the tiers that contributed at least one field
    #[serde(default)]
    pub sources: Vec<String>,
}

/// One downloadable rendition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptor {
    pub quality_label: String,
    pub container: String,
    pub approx_size_bytes: Option<u64>,
    pub source_url: Option<String>,
}

/// Partial metadata produced by one tier of the fetch chain.
///
/// Patches are folded in tier order; the first tier to supply a field wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<f64>,
    pub author_name: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub tags: Option<Vec<String>>,
    pub formats: Option<Vec<FormatDescriptor>>,
}

impl MetadataPatch {
    /// True when the tier supplied nothing usable
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.thumbnail_url.is_none()
            && self.duration_seconds.is_none()
            && self.author_name.is_none()
            && self.view_count.is_none()
            && self.like_count.is_none()
            && self.comment_count.is_none()
            && self.tags.is_none()
            && self.formats.is_none()
    }

    /// Drop blank strings, empty lists and nonsensical durations
    pub fn normalized(self) -> Self {
        Self {
            title: non_blank(self.title),
            description: non_blank(self.description),
            thumbnail_url: non_blank(self.thumbnail_url),
            duration_seconds: self
                .duration_seconds
                .filter(|d| d.is_finite() && *d > 0.0),
            author_name: non_blank(self.author_name),
            view_count: self.view_count,
            like_count: self.like_count,
            comment_count: self.comment_count,
            tags: self.tags.filter(|t| !t.is_empty()),
            formats: self.formats.filter(|f| !f.is_empty()),
        }
    }

    /// Merge with a lower-priority patch: fields already present are kept
    pub fn or(self, fallback: MetadataPatch) -> MetadataPatch {
        MetadataPatch {
            title: self.title.or(fallback.title),
            description: self.description.or(fallback.description),
            thumbnail_url: self.thumbnail_url.or(fallback.thumbnail_url),
            duration_seconds: self.duration_seconds.or(fallback.duration_seconds),
            author_name: self.author_name.or(fallback.author_name),
            view_count: self.view_count.or(fallback.view_count),
            like_count: self.like_count.or(fallback.like_count),
            comment_count: self.comment_count.or(fallback.comment_count),
            tags: self.tags.or(fallback.tags),
            formats: self.formats.or(fallback.formats),
        }
    }

    /// Placeholder values used when every tier came back empty
    pub fn placeholder(video: &VideoReference) -> MetadataPatch {
        let label = video.platform.label();
        let thumbnail_url = match video.platform {
            PlatformKind::YouTube => Some(format!(
                "https://img.youtube.com/vi/{}/maxresdefault.jpg",
                video.platform_video_id
            )),
            _ => None,
        };

        MetadataPatch {
            title: Some(format!("{} Video {}", label, video.platform_video_id)),
            description: Some(format!("{} video content", label)),
            thumbnail_url,
            author_name: Some(format!("{} User", label)),
            formats: Some(vec![FormatDescriptor {
                quality_label: "HD".to_string(),
                container: "mp4".to_string(),
                approx_size_bytes: None,
                source_url: None,
            }]),
            ..Default::default()
        }
    }

    /// Complete the record, filling remaining gaps from the placeholder
    pub fn finish(self, video: &VideoReference, sources: Vec<String>) -> VideoMetadata {
        let merged = self.or(MetadataPatch::placeholder(video));

        VideoMetadata {
            video_id: video.platform_video_id.clone(),
            platform: video.platform,
            title: merged.title.unwrap_or_default(),
            description: merged.description.unwrap_or_default(),
            thumbnail_url: merged.thumbnail_url,
            duration_seconds: merged.duration_seconds,
            author_name: merged.author_name.unwrap_or_default(),
            view_count: merged.view_count,
            like_count: merged.like_count,
            comment_count: merged.comment_count,
            tags: merged.tags.unwrap_or_default(),
            available_formats: merged.formats.unwrap_or_default(),
            sources,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
