//! yt-dlp download engine module

pub mod engine;
pub mod format;
pub mod progress;

// Re-export for convenience
pub use engine::{find_artifact, is_partial, DownloadRequest, ExtractorEngine};
pub use format::{DownloadFormat, DownloadQuality, FormatSelection};
pub use progress::{parse_progress_line, ProgressUpdate};
