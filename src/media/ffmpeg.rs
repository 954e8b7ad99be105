//! FFmpeg / ffprobe process runner

use crate::utils::error::LoopError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, warn};

const STDERR_TAIL_LINES: usize = 12;

/// Summary of a media file as reported by ffprobe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaProbe {
    pub duration_seconds: Option<f64>,
    pub container: Option<String>,
    pub size_bytes: Option<u64>,
    pub bit_rate: Option<u64>,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStreamInfo {
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub bit_rate: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStreamInfo {
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub bit_rate: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Option<Vec<FfprobeStream>>,
    format: Option<FfprobeFormat>,
}

// ffprobe reports most numbers as strings
#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    bit_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

fn parse_num<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// `30000/1001` -> 29.97
fn parse_frame_rate(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/').unwrap_or((value, "1"));
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (den != 0.0 && num > 0.0).then(|| num / den)
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output
pub fn parse_probe(json: &[u8]) -> Result<MediaProbe, LoopError> {
    let parsed: FfprobeOutput = serde_json::from_slice(json)?;
    let streams = parsed.streams.unwrap_or_default();
    let format = parsed.format;

    let video = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .map(|s| VideoStreamInfo {
            codec: s.codec_name.clone(),
            width: s.width,
            height: s.height,
            fps: s.r_frame_rate.as_deref().and_then(parse_frame_rate),
            bit_rate: parse_num(s.bit_rate.as_deref()),
        });

    let audio = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .map(|s| AudioStreamInfo {
            codec: s.codec_name.clone(),
            sample_rate: parse_num(s.sample_rate.as_deref()),
            channels: s.channels,
            bit_rate: parse_num(s.bit_rate.as_deref()),
        });

    Ok(MediaProbe {
        duration_seconds: format.as_ref().and_then(|f| parse_num(f.duration.as_deref())),
        // "mov,mp4,m4a,3gp,3g2,mj2" -> "mov"
        container: format
            .as_ref()
            .and_then(|f| f.format_name.as_deref())
            .and_then(|n| n.split(',').next())
            .map(str::to_string),
        size_bytes: format.as_ref().and_then(|f| parse_num(f.size.as_deref())),
        bit_rate: format.as_ref().and_then(|f| parse_num(f.bit_rate.as_deref())),
        video,
        audio,
    })
}

/// Last few meaningful lines of FFmpeg's stderr
pub fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Runs ffmpeg/ffprobe as child processes with a hard timeout
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfmpegRunner {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    /// Run ffmpeg with `-nostdin -y` prepended
    pub async fn run(&self, args: &[String]) -> Result<(), LoopError> {
        debug!("Running {:?} -nostdin -y {}", self.ffmpeg, args.join(" "));

        let child = AsyncCommand::new(&self.ffmpeg)
            .args(["-nostdin", "-y"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                LoopError::processing(
                    "ffmpeg",
                    format!("timed out after {} seconds", self.timeout.as_secs()),
                )
            })?
            .map_err(|e| LoopError::from_spawn("ffmpeg", e))?;

        if !output.status.success() {
            let tail = stderr_tail(&String::from_utf8_lossy(&output.stderr));
            warn!("ffmpeg exited with {}: {}", output.status, tail);
            return Err(LoopError::processing(
                "ffmpeg",
                if tail.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    tail
                },
            ));
        }
        Ok(())
    }

    pub async fn probe(&self, input: &Path) -> Result<MediaProbe, LoopError> {
        debug!("Probing {:?}", input);

        let child = AsyncCommand::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| LoopError::processing("ffprobe", "timed out"))?
            .map_err(|e| LoopError::from_spawn("ffprobe", e))?;

        if !output.status.success() {
            return Err(LoopError::processing(
                "ffprobe",
                stderr_tail(&String::from_utf8_lossy(&output.stderr)),
            ));
        }

        parse_probe(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720, "r_frame_rate": "30000/1001", "bit_rate": "2500000"},
                {"codec_type": "audio", "codec_name": "aac", "sample_rate": "44100", "channels": 2, "bit_rate": "128000"}
            ],
            "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "12.480000", "size": "3900000", "bit_rate": "2600000"}
        }"#;

        let probe = parse_probe(json).unwrap();
        assert_eq!(probe.container.as_deref(), Some("mov"));
        assert_eq!(probe.duration_seconds, Some(12.48));
        assert_eq!(probe.size_bytes, Some(3_900_000));

        let video = probe.video.unwrap();
        assert_eq!(video.codec.as_deref(), Some("h264"));
        assert_eq!((video.width, video.height), (Some(1280), Some(720)));
        assert!((video.fps.unwrap() - 29.97).abs() < 0.01);

        let audio = probe.audio.unwrap();
        assert_eq!(audio.sample_rate, Some(44100));
        assert_eq!(audio.channels, Some(2));
    }

    #[test]
    fn test_parse_probe_audio_only() {
        let json = br#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}], "format": {}}"#;
        let probe = parse_probe(json).unwrap();
        assert!(probe.video.is_none());
        assert_eq!(probe.audio.unwrap().codec.as_deref(), Some("mp3"));
    }

    #[test]
    fn test_frame_rate_edge_cases() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr = (0..30).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 18"));
        assert!(tail.ends_with("line 29"));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_tool_not_found() {
        let runner = FfmpegRunner::new("/no/ffmpeg", "/no/ffprobe", Duration::from_secs(5));
        let err = runner.run(&["-version".to_string()]).await.unwrap_err();
        assert!(matches!(err, LoopError::ToolNotFound(ref t) if t == "ffmpeg"));
    }
}
