//! Loopforge library

pub mod downloader;
pub mod extractor;
pub mod media;
pub mod queue;
pub mod resolver;
pub mod server;
pub mod utils;

// Re-export main types for easier use
pub use downloader::{DownloadFormat, DownloadQuality, ExtractorEngine, FormatSelection};
pub use extractor::{MetadataFetcher, VideoMetadata};
pub use media::MediaTransformService;
pub use queue::{JobManager, JobStatusReport};
pub use resolver::{PlatformKind, VideoReference};
pub use server::AppState;
pub use utils::{AppSettings, LoopError};
