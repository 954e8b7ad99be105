//! URL pattern matching for platform detection and video id extraction

use crate::resolver::models::{PlatformKind, VideoReference};
use crate::utils::error::LoopError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("URL does not belong to a supported platform: {0}")]
    NotRecognized(String),

    #[error("no {platform} video id found in {url}")]
    IdNotFound { platform: PlatformKind, url: String },
}

impl From<ResolveError> for LoopError {
    fn from(err: ResolveError) -> Self {
        LoopError::InvalidUrl(err.to_string())
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static URL pattern must compile")
}

// Order matters: first platform whose host pattern matches wins.
static PLATFORM_PATTERNS: Lazy<Vec<(PlatformKind, Regex)>> = Lazy::new(|| {
    vec![
        (
            PlatformKind::Facebook,
            compile(r"(?i)^(?:https?://)?(?:[a-z0-9-]+\.)*(?:facebook\.com|fb\.com|fb\.watch)(?:[/?#:]|$)"),
        ),
        (
            PlatformKind::Instagram,
            compile(r"(?i)^(?:https?://)?(?:[a-z0-9-]+\.)*(?:instagram\.com|instagr\.am)/(?:p|reel|tv)/"),
        ),
        (
            PlatformKind::YouTube,
            compile(r"(?i)^(?:https?://)?(?:[a-z0-9-]+\.)*(?:youtube\.com|youtube-nocookie\.com|youtu\.be)(?:[/?#:]|$)"),
        ),
    ]
});

static YOUTUBE_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r"(?i)youtube(?:-nocookie)?\.com/watch/?\?(?:[^#]*&)?v=([A-Za-z0-9_-]+)"),
        compile(r"(?i)youtu\.be/([A-Za-z0-9_-]+)"),
        compile(r"(?i)youtube(?:-nocookie)?\.com/(?:shorts|embed|v|live)/([A-Za-z0-9_-]+)"),
    ]
});

static FACEBOOK_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r"(?i)facebook\.com/(?:[^?#]*?/)?videos/(?:[^/?#]+/)?(\d+)"),
        compile(r"(?i)facebook\.com/video\.php\?(?:[^#]*&)?v=(\d+)"),
        compile(r"(?i)facebook\.com/watch/?\?(?:[^#]*&)?v=(\d+)"),
        compile(r"(?i)facebook\.com/reel/(\d+)"),
        compile(r"(?i)fb\.watch/([A-Za-z0-9_-]+)"),
    ]
});

static INSTAGRAM_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r"(?i)(?:instagram\.com|instagr\.am)/p/([A-Za-z0-9_-]+)"),
        compile(r"(?i)(?:instagram\.com|instagr\.am)/reel/([A-Za-z0-9_-]+)"),
        compile(r"(?i)(?:instagram\.com|instagr\.am)/tv/([A-Za-z0-9_-]+)"),
    ]
});

/// Identify the platform a URL belongs to; `None` means not recognized
pub fn resolve_platform(url: &str) -> Option<PlatformKind> {
    let url = url.trim();
    PLATFORM_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(url))
        .map(|(platform, _)| *platform)
}

/// Extract the platform video id using the platform's patterns in priority order
pub fn extract_video_id(url: &str, platform: PlatformKind) -> Result<String, ResolveError> {
    let patterns = match platform {
        PlatformKind::YouTube => &*YOUTUBE_ID_PATTERNS,
        PlatformKind::Facebook => &*FACEBOOK_ID_PATTERNS,
        PlatformKind::Instagram => &*INSTAGRAM_ID_PATTERNS,
    };

    let url = url.trim();
    patterns
        .iter()
        .find_map(|re| re.captures(url).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ResolveError::IdNotFound {
            platform,
            url: url.to_string(),
        })
}

/// Resolve a URL into a full video reference
pub fn resolve(url: &str) -> Result<VideoReference, ResolveError> {
    let trimmed = url.trim();
    let platform =
        resolve_platform(trimmed).ok_or_else(|| ResolveError::NotRecognized(trimmed.to_string()))?;
    let platform_video_id = extract_video_id(trimmed, platform)?;

    Ok(VideoReference {
        url: trimmed.to_string(),
        platform,
        platform_video_id,
    })
}
