pub mod browser;
pub mod fetcher;
pub mod models;
pub mod native;
pub mod traits;
pub mod ytdlp;

pub use fetcher::MetadataFetcher;
pub use models::{FormatDescriptor, MetadataPatch, VideoMetadata};
pub use traits::MetadataSource;
pub use ytdlp::YtDlpSource;
