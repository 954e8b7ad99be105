//! Platform URL resolver

pub mod models;
pub mod patterns;

pub use models::{PlatformKind, VideoReference};
pub use patterns::{extract_video_id, resolve, resolve_platform, ResolveError};
