//! Media transform service
//!
//! Every operation checks its inputs, writes a fresh `<prefix>_<uuid>.<ext>`
//! into the output directory and leaves the inputs untouched. Argument lists
//! are built by pure functions so they can be checked without FFmpeg.

use crate::media::ffmpeg::{FfmpegRunner, MediaProbe};
use crate::media::presets::{ConvertQuality, WallpaperSettings, WallpaperSize};
use crate::utils::config::AppSettings;
use crate::utils::error::LoopError;
use crate::utils::paths::{self, Tool};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of one transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    pub success: bool,
    pub output_path: PathBuf,
    pub output_file_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<WallpaperSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    Deleted,
    NotFound,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupEntry {
    pub path: PathBuf,
    pub status: CleanupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub success: bool,
    pub results: Vec<CleanupEntry>,
    pub message: String,
}

/// Reject anything that is not a short alphanumeric extension
pub fn validate_format(format: &str) -> Result<String, LoopError> {
    let format = format.trim().trim_start_matches('.').to_ascii_lowercase();
    if format.is_empty() || format.len() > 8 || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LoopError::InvalidRequest(format!(
            "invalid output format '{}'",
            format
        )));
    }
    Ok(format)
}

/// `end > start`, `start >= 0`, both finite
pub fn validate_trim(start: f64, end: f64) -> Result<(), LoopError> {
    if !start.is_finite() || !end.is_finite() {
        return Err(LoopError::InvalidRequest("trim bounds must be finite numbers".into()));
    }
    if start < 0.0 {
        return Err(LoopError::InvalidRequest("start time cannot be negative".into()));
    }
    if end <= start {
        return Err(LoopError::InvalidRequest(format!(
            "end time ({}) must be greater than start time ({})",
            end, start
        )));
    }
    Ok(())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn trim_args(input: &Path, output: &Path, start: f64, end: f64) -> Vec<String> {
    let mut args = strings(["-ss"]);
    args.push(format!("{}", start));
    args.extend(["-i".to_string(), path_arg(input), "-t".to_string(), format!("{}", end - start)]);
    args.extend(strings(["-c:v", "libx264", "-c:a", "aac", "-preset", "fast", "-crf", "23"]));
    args.push(path_arg(output));
    args
}

pub fn extract_audio_args(input: &Path, output: &Path, format: &str) -> Vec<String> {
    let codec = if format == "mp3" { "libmp3lame" } else { "aac" };
    let mut args = vec!["-i".to_string(), path_arg(input)];
    args.extend(strings(["-vn", "-c:a", codec, "-b:a", "192k", "-ar", "44100"]));
    args.push(path_arg(output));
    args
}

pub fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        path_arg(video),
        "-i".to_string(),
        path_arg(audio),
    ];
    args.extend(strings(["-c:v", "copy", "-c:a", "aac", "-shortest"]));
    args.push(path_arg(output));
    args
}

pub fn convert_args(input: &Path, output: &Path, quality: ConvertQuality) -> Vec<String> {
    let (preset, crf) = quality.encoder_settings();
    let mut args = vec!["-i".to_string(), path_arg(input)];
    args.extend(strings(["-c:v", "libx264", "-c:a", "aac", "-preset", preset, "-crf"]));
    args.push(crf.to_string());
    args.push(path_arg(output));
    args
}

pub fn wallpaper_args(input: &Path, output: &Path, settings: &WallpaperSettings) -> Vec<String> {
    let mut args = vec!["-i".to_string(), path_arg(input)];
    args.extend(strings(["-c:v", "libx264", "-c:a", "aac", "-preset", "fast", "-crf"]));
    args.push(settings.crf.to_string());
    args.push("-vf".to_string());
    args.push(format!("scale={}:{}", settings.width, settings.height));
    args.push("-r".to_string());
    args.push(settings.fps.to_string());
    args.extend(strings(["-movflags", "+faststart", "-pix_fmt", "yuv420p"]));
    args.push(path_arg(output));
    args
}

/// FFmpeg-backed trim/extract/merge/convert/wallpaper operations
#[derive(Debug, Clone)]
pub struct MediaTransformService {
    runner: FfmpegRunner,
    output_dir: PathBuf,
}

impl MediaTransformService {
    pub fn new(runner: FfmpegRunner, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            output_dir: output_dir.into(),
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        let runner = FfmpegRunner::new(
            paths::tool_path_or_name(Tool::Ffmpeg, settings.ffmpeg_path.as_deref()),
            paths::tool_path_or_name(Tool::Ffprobe, settings.ffprobe_path.as_deref()),
            settings.transform_timeout(),
        );
        Self::new(runner, &settings.output_dir)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Fresh `<prefix>_<uuid>.<ext>` path in the output directory
    fn output_for(&self, prefix: &str, ext: &str) -> (PathBuf, String) {
        let name = format!("{}_{}.{}", prefix, Uuid::new_v4(), ext);
        (self.output_dir.join(&name), name)
    }

    async fn run(
        &self,
        args: Vec<String>,
        output: PathBuf,
        name: String,
        message: &str,
    ) -> Result<TransformResult, LoopError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        if let Err(e) = self.runner.run(&args).await {
            // Don't leave half-written outputs behind
            if tokio::fs::remove_file(&output).await.is_ok() {
                debug!("Removed partial output {:?}", output);
            }
            return Err(e);
        }

        info!("{}: {:?}", message, output);
        Ok(TransformResult {
            success: true,
            output_path: output,
            output_file_name: name,
            message: message.to_string(),
            settings: None,
        })
    }

    pub async fn trim(
        &self,
        input: &Path,
        start: f64,
        end: f64,
        format: Option<&str>,
    ) -> Result<TransformResult, LoopError> {
        validate_trim(start, end)?;
        let format = validate_format(format.unwrap_or("mp4"))?;
        ensure_exists(input).await?;

        let (output, name) = self.output_for("trimmed", &format);
        let args = trim_args(input, &output, start, end);
        self.run(args, output, name, "Video trimmed successfully").await
    }

    pub async fn extract_audio(
        &self,
        input: &Path,
        format: Option<&str>,
    ) -> Result<TransformResult, LoopError> {
        let format = validate_format(format.unwrap_or("mp3"))?;
        ensure_exists(input).await?;

        let (output, name) = self.output_for("audio", &format);
        let args = extract_audio_args(input, &output, &format);
        self.run(args, output, name, "Audio extracted successfully").await
    }

    pub async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        format: Option<&str>,
    ) -> Result<TransformResult, LoopError> {
        let format = validate_format(format.unwrap_or("mp4"))?;
        ensure_exists(video).await?;
        ensure_exists(audio).await?;

        let (output, name) = self.output_for("merged", &format);
        let args = merge_args(video, audio, &output);
        self.run(args, output, name, "Video and audio merged successfully")
            .await
    }

    pub async fn convert(
        &self,
        input: &Path,
        format: Option<&str>,
        quality: ConvertQuality,
    ) -> Result<TransformResult, LoopError> {
        let format = validate_format(format.unwrap_or("mp4"))?;
        ensure_exists(input).await?;

        let (output, name) = self.output_for("converted", &format);
        let args = convert_args(input, &output, quality);
        self.run(args, output, name, "Video converted successfully").await
    }

    pub async fn optimize_wallpaper(
        &self,
        input: &Path,
        size: WallpaperSize,
    ) -> Result<TransformResult, LoopError> {
        ensure_exists(input).await?;

        let settings = size.settings();
        let (output, name) = self.output_for("wallpaper", "mp4");
        let args = wallpaper_args(input, &output, &settings);
        let mut result = self
            .run(args, output, name, "Video optimized for live wallpaper")
            .await?;
        result.settings = Some(settings);
        Ok(result)
    }

    pub async fn probe(&self, input: &Path) -> Result<MediaProbe, LoopError> {
        ensure_exists(input).await?;
        self.runner.probe(input).await
    }

    /// Best-effort delete. Never fails as a whole; paths outside the output
    /// directory are refused.
    pub async fn cleanup(&self, file_paths: &[PathBuf]) -> CleanupReport {
        let root = self
            .output_dir
            .absolutize()
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| self.output_dir.clone());

        let mut results = Vec::with_capacity(file_paths.len());
        for path in file_paths {
            results.push(cleanup_one(&root, path).await);
        }

        CleanupReport {
            success: true,
            results,
            message: "Cleanup completed".to_string(),
        }
    }
}

async fn cleanup_one(root: &Path, path: &Path) -> CleanupEntry {
    let entry = |status, error: Option<String>| CleanupEntry {
        path: path.to_path_buf(),
        status,
        error,
    };

    let absolute = match path.absolutize() {
        Ok(p) => p.into_owned(),
        Err(e) => return entry(CleanupStatus::Error, Some(e.to_string())),
    };
    if !absolute.starts_with(root) || absolute == root {
        warn!("Refusing to delete {:?} outside {:?}", path, root);
        return entry(
            CleanupStatus::Error,
            Some("path is outside the output directory".to_string()),
        );
    }

    match tokio::fs::remove_file(&absolute).await {
        Ok(()) => {
            debug!("Deleted {:?}", absolute);
            entry(CleanupStatus::Deleted, None)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => entry(CleanupStatus::NotFound, None),
        Err(e) => entry(CleanupStatus::Error, Some(e.to_string())),
    }
}

async fn ensure_exists(path: &Path) -> Result<(), LoopError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(LoopError::FileNotFound(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn service(dir: &Path) -> MediaTransformService {
        let runner = FfmpegRunner::new("/no/ffmpeg", "/no/ffprobe", Duration::from_secs(5));
        MediaTransformService::new(runner, dir)
    }

    fn pair<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.windows(2)
            .find(|w| w[0] == flag)
            .map(|w| w[1].as_str())
    }

    // ============================================================
    // VALIDATION
    // ============================================================

    #[test]
    fn test_validate_trim() {
        assert!(validate_trim(0.0, 5.0).is_ok());
        assert!(validate_trim(10.0, 5.0).is_err());
        assert!(validate_trim(5.0, 5.0).is_err());
        assert!(validate_trim(-1.0, 5.0).is_err());
        assert!(validate_trim(f64::NAN, 5.0).is_err());
        assert!(validate_trim(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_format() {
        assert_eq!(validate_format("MP4").unwrap(), "mp4");
        assert_eq!(validate_format(".webm").unwrap(), "webm");
        assert!(validate_format("").is_err());
        assert!(validate_format("mp4; rm -rf /").is_err());
        assert!(validate_format("../../x").is_err());
        assert!(validate_format("averyverylongext").is_err());
    }

    #[tokio::test]
    async fn test_trim_rejects_bad_range_before_touching_files() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        // Input does not exist either; the range check must win
        let err = svc
            .trim(Path::new("/no/such/input.mp4"), 10.0, 5.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoopError::InvalidRequest(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_input_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        let err = svc
            .extract_audio(Path::new("/no/such/input.mp4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoopError::FileNotFound(_)));

        let err = svc
            .optimize_wallpaper(Path::new("/no/such/input.mp4"), WallpaperSize::Small)
            .await
            .unwrap_err();
        assert!(matches!(err, LoopError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_surfaces_as_tool_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"not really a video").unwrap();

        let err = service(dir.path())
            .convert(&input, None, ConvertQuality::Medium)
            .await
            .unwrap_err();
        assert!(matches!(err, LoopError::ToolNotFound(_)));
        assert!(input.exists(), "input is never mutated");
    }

    // ============================================================
    // ARGUMENT BUILDERS
    // ============================================================

    #[test]
    fn test_trim_args() {
        let args = trim_args(Path::new("in.mp4"), Path::new("out.mp4"), 1.5, 4.0);
        assert_eq!(pair(&args, "-ss"), Some("1.5"));
        assert_eq!(pair(&args, "-t"), Some("2.5"));
        assert_eq!(pair(&args, "-c:v"), Some("libx264"));
        assert_eq!(pair(&args, "-crf"), Some("23"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_extract_audio_codec_follows_format() {
        let mp3 = extract_audio_args(Path::new("in.mp4"), Path::new("a.mp3"), "mp3");
        assert_eq!(pair(&mp3, "-c:a"), Some("libmp3lame"));
        assert!(mp3.contains(&"-vn".to_string()));
        assert_eq!(pair(&mp3, "-b:a"), Some("192k"));
        assert_eq!(pair(&mp3, "-ar"), Some("44100"));

        let m4a = extract_audio_args(Path::new("in.mp4"), Path::new("a.m4a"), "m4a");
        assert_eq!(pair(&m4a, "-c:a"), Some("aac"));
    }

    #[test]
    fn test_merge_args() {
        let args = merge_args(Path::new("v.mp4"), Path::new("a.mp3"), Path::new("out.mp4"));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert_eq!(pair(&args, "-c:v"), Some("copy"));
        assert!(args.contains(&"-shortest".to_string()));
    }

    #[test]
    fn test_convert_args_use_quality_preset() {
        let args = convert_args(Path::new("in.mov"), Path::new("out.mp4"), ConvertQuality::Low);
        assert_eq!(pair(&args, "-preset"), Some("ultrafast"));
        assert_eq!(pair(&args, "-crf"), Some("28"));
    }

    #[test]
    fn test_small_wallpaper_args() {
        let settings = WallpaperSize::Small.settings();
        let args = wallpaper_args(Path::new("in.mp4"), Path::new("out.mp4"), &settings);

        assert_eq!(pair(&args, "-vf"), Some("scale=640:360"));
        assert_eq!(pair(&args, "-r"), Some("24"));
        assert_eq!(pair(&args, "-crf"), Some("25"));
        assert_eq!(pair(&args, "-pix_fmt"), Some("yuv420p"));
        assert_eq!(pair(&args, "-movflags"), Some("+faststart"));
    }

    // ============================================================
    // CLEANUP
    // ============================================================

    #[tokio::test]
    async fn test_cleanup_reports_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("trimmed_1.mp4");
        std::fs::write(&existing, b"x").unwrap();
        let missing = dir.path().join("trimmed_2.mp4");

        let report = service(dir.path()).cleanup(&[existing.clone(), missing.clone()]).await;

        assert!(report.success);
        assert_eq!(report.results[0].status, CleanupStatus::Deleted);
        assert_eq!(report.results[1].status, CleanupStatus::NotFound);
        assert!(!existing.exists());
    }

    #[tokio::test]
    async fn test_cleanup_refuses_paths_outside_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::NamedTempFile::new().unwrap();
        let sneaky = dir.path().join("..").join("escape.mp4");

        let report = service(dir.path())
            .cleanup(&[outside.path().to_path_buf(), sneaky])
            .await;

        assert!(report.success);
        assert!(report.results.iter().all(|r| r.status == CleanupStatus::Error));
        assert!(outside.path().exists());
    }

    #[test]
    fn test_cleanup_status_wire_names() {
        assert_eq!(serde_json::to_string(&CleanupStatus::NotFound).unwrap(), r#""not_found""#);
        assert_eq!(serde_json::to_string(&CleanupStatus::Deleted).unwrap(), r#""deleted""#);
    }
}
