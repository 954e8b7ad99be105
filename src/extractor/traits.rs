use crate::extractor::models::MetadataPatch;
use crate::resolver::VideoReference;
use anyhow::Result;
use async_trait::async_trait;

/// Core trait for all metadata sources
///
/// Each tier of the fetch chain (platform API, yt-dlp, browser scrape)
/// implements this so the fetcher can fold their results without knowing
/// how each one talks to the outside world.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Returns a unique identifier for this source (e.g., "youtube-api", "yt-dlp")
    fn id(&self) -> &'static str;

    /// Checks if this source can handle the given video at all
    fn supports(&self, _video: &VideoReference) -> bool {
        true
    }

    /// Fetches whatever this source knows about the video
    async fn fetch(&self, video: &VideoReference) -> Result<MetadataPatch>;
}
