use crate::extractor::browser::BrowserScrapeSource;
use crate::extractor::models::{MetadataPatch, VideoMetadata};
use crate::extractor::native::YouTubeApiSource;
use crate::extractor::traits::MetadataSource;
use crate::extractor::ytdlp::YtDlpSource;
use crate::resolver::{self, VideoReference};
use crate::utils::config::AppSettings;
use crate::utils::error::LoopError;
use crate::utils::paths::{self, Tool};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tiered metadata fetcher
///
/// Tiers are consulted in a fixed order and their patches folded so that
/// the first tier to supply a field wins:
/// 1. platform API (only when configured and supported)
/// 2. yt-dlp, when tier 1 failed or gave no formats
/// 3. headless browser, only when tiers 1 and 2 produced nothing
/// 4. placeholder values for whatever is still missing
pub struct MetadataFetcher {
    api: Option<Arc<dyn MetadataSource>>,
    cli: Option<Arc<dyn MetadataSource>>,
    scrape: Option<Arc<dyn MetadataSource>>,
}

impl MetadataFetcher {
    pub fn new(
        api: Option<Arc<dyn MetadataSource>>,
        cli: Option<Arc<dyn MetadataSource>>,
        scrape: Option<Arc<dyn MetadataSource>>,
    ) -> Self {
        Self { api, cli, scrape }
    }

    /// Wire up the real tiers from the settings
    pub fn from_settings(settings: &AppSettings) -> Self {
        let api = settings.youtube_api_key.as_deref().and_then(|key| {
            match YouTubeApiSource::new(key) {
                Ok(source) => Some(Arc::new(source) as Arc<dyn MetadataSource>),
                Err(e) => {
                    warn!("YouTube API tier disabled: {}", e);
                    None
                }
            }
        });

        let cli = Some(Arc::new(YtDlpSource::new(
            paths::tool_path_or_name(Tool::YtDlp, settings.ytdlp_path.as_deref()),
            settings.metadata_timeout(),
        )) as Arc<dyn MetadataSource>);

        let scrape = paths::find_tool(Tool::Browser, settings.browser_path.as_deref()).map(|path| {
            Arc::new(BrowserScrapeSource::new(
                path,
                settings.scrape_timeout(),
                settings.media_wait(),
            )) as Arc<dyn MetadataSource>
        });

        Self::new(api, cli, scrape)
    }

    /// Resolve the URL and fetch its metadata. Only fails on an invalid URL.
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, LoopError> {
        let video = resolver::resolve(url)?;
        Ok(self.fetch(&video).await)
    }

    /// Fetch metadata for an already resolved reference
    pub async fn fetch(&self, video: &VideoReference) -> VideoMetadata {
        let mut merged = MetadataPatch::default();
        let mut sources = Vec::new();

        let api_ok = match Self::run_tier(&self.api, video).await {
            Some((id, patch)) => {
                merged = merged.or(patch);
                sources.push(id.to_string());
                true
            }
            None => false,
        };

        if !api_ok || merged.formats.is_none() {
            if let Some((id, patch)) = Self::run_tier(&self.cli, video).await {
                merged = merged.or(patch);
                sources.push(id.to_string());
            }
        }

        if merged.is_empty() {
            if let Some((id, patch)) = Self::run_tier(&self.scrape, video).await {
                merged = merged.or(patch);
                sources.push(id.to_string());
            }
        }

        if sources.is_empty() {
            info!(
                "All metadata tiers failed for {} {}, using placeholder",
                video.platform, video.platform_video_id
            );
            sources.push("placeholder".to_string());
        }

        merged.finish(video, sources)
    }

    /// Run one tier; failures and empty results are logged and swallowed
    async fn run_tier(
        tier: &Option<Arc<dyn MetadataSource>>,
        video: &VideoReference,
    ) -> Option<(&'static str, MetadataPatch)> {
        let source = tier.as_ref()?;
        if !source.supports(video) {
            debug!("Tier {} does not support {}", source.id(), video.platform);
            return None;
        }

        match source.fetch(video).await {
            Ok(patch) => {
                let patch = patch.normalized();
                if patch.is_empty() {
                    warn!("Tier {} returned no metadata for {}", source.id(), video.url);
                    None
                } else {
                    debug!("Tier {} supplied metadata for {}", source.id(), video.url);
                    Some((source.id(), patch))
                }
            }
            Err(e) => {
                warn!("Tier {} failed for {}: {}", source.id(), video.url, e);
                None
            }
        }
    }
}
