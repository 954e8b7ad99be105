//! FFmpeg-backed media transforms

pub mod ffmpeg;
pub mod presets;
pub mod transform;

pub use ffmpeg::{FfmpegRunner, MediaProbe};
pub use presets::{ConvertQuality, WallpaperSettings, WallpaperSize};
pub use transform::{CleanupReport, CleanupStatus, MediaTransformService, TransformResult};
