use crate::extractor::models::MetadataPatch;
use crate::extractor::traits::MetadataSource;
use crate::resolver::{PlatformKind, VideoReference};
use crate::utils::error::LoopError;
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";

static ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
        .expect("static duration pattern must compile")
});

/// Parse an ISO-8601 duration such as `PT1H2M3S` into seconds
pub fn parse_iso8601_duration(value: &str) -> Option<f64> {
    let caps = ISO_DURATION.captures(value.trim())?;
    let part = |i: usize| -> f64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    let total = part(1) * 86_400.0 + part(2) * 3_600.0 + part(3) * 60.0 + part(4);
    (total > 0.0).then_some(total)
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    snippet: Option<Snippet>,
    statistics: Option<Statistics>,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    channel_title: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

// The API encodes counters as strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

fn count(value: Option<String>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Map a `videos.list` response body onto a patch
pub fn parse_videos_response(body: &str) -> Result<MetadataPatch> {
    let response: VideoListResponse = serde_json::from_str(body)?;
    let item = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| LoopError::UpstreamUnavailable("YouTube API returned no items".into()))?;

    let mut patch = MetadataPatch::default();

    if let Some(snippet) = item.snippet {
        let thumbs = snippet.thumbnails;
        patch.title = snippet.title;
        patch.description = snippet.description;
        patch.author_name = snippet.channel_title;
        patch.tags = snippet.tags;
        patch.thumbnail_url = thumbs
            .maxres
            .or(thumbs.high)
            .or(thumbs.default)
            .map(|t| t.url);
    }

    if let Some(stats) = item.statistics {
        patch.view_count = count(stats.view_count);
        patch.like_count = count(stats.like_count);
        patch.comment_count = count(stats.comment_count);
    }

    patch.duration_seconds = item
        .content_details
        .and_then(|d| d.duration)
        .and_then(|d| parse_iso8601_duration(&d));

    Ok(patch.normalized())
}

/// Metadata tier backed by the YouTube Data API (`videos.list` only)
pub struct YouTubeApiSource {
    client: reqwest::Client,
    api_key: String,
}

impl YouTubeApiSource {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl MetadataSource for YouTubeApiSource {
    fn id(&self) -> &'static str {
        "youtube-api"
    }

    fn supports(&self, video: &VideoReference) -> bool {
        video.platform == PlatformKind::YouTube
    }

    async fn fetch(&self, video: &VideoReference) -> Result<MetadataPatch> {
        info!("YouTube API lookup for {}", video.platform_video_id);

        let response = self
            .client
            .get(VIDEOS_ENDPOINT)
            .query(&[
                ("part", "snippet,statistics,contentDetails"),
                ("id", video.platform_video_id.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(LoopError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(LoopError::from)?;
        if !status.is_success() {
            debug!("YouTube API error body: {}", body);
            return Err(LoopError::UpstreamUnavailable(format!("YouTube API returned {}", status)).into());
        }

        parse_videos_response(&body)
    }
}
