//! Media transforms and cleanup against fake ffmpeg/ffprobe binaries.

#![cfg(unix)]

mod common;

use common::{write_script, FFMPEG_FAIL, FFMPEG_OK, FFPROBE_OK};
use loopforge::media::{CleanupStatus, ConvertQuality, FfmpegRunner, MediaTransformService, WallpaperSize};
use loopforge::utils::LoopError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    temp: TempDir,
    output: PathBuf,
    input: PathBuf,
    service: MediaTransformService,
}

fn fixture(ffmpeg_body: &str) -> Fixture {
    let temp = TempDir::new().expect("temp dir");
    let tools = temp.path().join("bin");
    std::fs::create_dir_all(&tools).expect("tools dir");
    let ffmpeg = write_script(&tools, "ffmpeg", ffmpeg_body);
    let ffprobe = write_script(&tools, "ffprobe", FFPROBE_OK);

    let output = temp.path().join("uploads");
    std::fs::create_dir_all(&output).expect("output dir");
    let input = output.join("youtube_abc_source.mp4");
    std::fs::write(&input, b"source").expect("input");

    let runner = FfmpegRunner::new(ffmpeg, ffprobe, Duration::from_secs(10));
    Fixture {
        service: MediaTransformService::new(runner, &output),
        output,
        input,
        temp,
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|e| e.flatten().count()).unwrap_or(0)
}

#[tokio::test]
async fn trim_writes_new_artifact() {
    let fx = fixture(FFMPEG_OK);

    let result = fx.service.trim(&fx.input, 2.0, 7.5, None).await.expect("trim");
    assert!(result.success);
    assert!(result.output_file_name.starts_with("trimmed_"));
    assert!(result.output_file_name.ends_with(".mp4"));
    assert!(result.output_path.starts_with(&fx.output));
    assert!(result.output_path.is_file());
    assert!(result.settings.is_none());
}

#[tokio::test]
async fn each_operation_names_its_output() {
    let fx = fixture(FFMPEG_OK);
    let audio = fx.output.join("audio_track.m4a");
    std::fs::write(&audio, b"audio").expect("audio");

    let extracted = fx.service.extract_audio(&fx.input, Some(".WAV")).await.expect("extract");
    assert!(extracted.output_file_name.starts_with("audio_"));
    assert!(extracted.output_file_name.ends_with(".wav"));

    let merged = fx.service.merge(&fx.input, &audio, Some("mkv")).await.expect("merge");
    assert!(merged.output_file_name.starts_with("merged_"));
    assert!(merged.output_file_name.ends_with(".mkv"));

    let converted = fx
        .service
        .convert(&fx.input, Some("webm"), ConvertQuality::High)
        .await
        .expect("convert");
    assert!(converted.output_file_name.starts_with("converted_"));
    assert!(converted.output_file_name.ends_with(".webm"));
}

#[tokio::test]
async fn wallpaper_result_carries_settings() {
    let fx = fixture(FFMPEG_OK);

    let result = fx
        .service
        .optimize_wallpaper(&fx.input, WallpaperSize::Small)
        .await
        .expect("wallpaper");
    assert!(result.output_file_name.starts_with("wallpaper_"));
    assert!(result.output_file_name.ends_with(".mp4"));

    let settings = result.settings.expect("settings");
    assert_eq!(settings, WallpaperSize::Small.settings());
}

#[tokio::test]
async fn failed_transform_leaves_no_output() {
    let fx = fixture(FFMPEG_FAIL);
    let before = count_files(&fx.output);

    let err = fx.service.convert(&fx.input, None, ConvertQuality::Medium).await.unwrap_err();
    match err {
        LoopError::ProcessingError { tool, message } => {
            assert_eq!(tool, "ffmpeg");
            assert!(message.contains("Invalid data found"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(count_files(&fx.output), before);
}

#[tokio::test]
async fn bad_requests_fail_before_ffmpeg_runs() {
    let fx = fixture(FFMPEG_OK);
    let before = count_files(&fx.output);

    assert!(matches!(
        fx.service.trim(&fx.input, 5.0, 5.0, None).await,
        Err(LoopError::InvalidRequest(_))
    ));
    assert!(matches!(
        fx.service.extract_audio(&fx.input, Some("mp3;rm -rf")).await,
        Err(LoopError::InvalidRequest(_))
    ));
    assert!(matches!(
        fx.service.merge(&fx.input, &fx.output.join("missing.m4a"), None).await,
        Err(LoopError::FileNotFound(_))
    ));
    assert_eq!(count_files(&fx.output), before);
}

#[tokio::test]
async fn probe_reports_streams() {
    let fx = fixture(FFMPEG_OK);

    let probe = fx.service.probe(&fx.input).await.expect("probe");
    assert_eq!(probe.container.as_deref(), Some("mov"));
    assert_eq!(probe.duration_seconds, Some(12.5));

    let video = probe.video.expect("video stream");
    assert_eq!((video.width, video.height), (Some(1920), Some(1080)));
    assert!((video.fps.unwrap_or_default() - 29.97).abs() < 0.01);

    let audio = probe.audio.expect("audio stream");
    assert_eq!(audio.sample_rate, Some(44100));
    assert_eq!(audio.channels, Some(2));
}

#[tokio::test]
async fn cleanup_deletes_transform_outputs() {
    let fx = fixture(FFMPEG_OK);
    let trimmed = fx.service.trim(&fx.input, 0.0, 1.0, None).await.expect("trim");

    let outside = fx.temp.path().join("keep.txt");
    std::fs::write(&outside, b"keep").expect("outside file");

    let report = fx
        .service
        .cleanup(&[
            trimmed.output_path.clone(),
            trimmed.output_path.clone(),
            outside.clone(),
        ])
        .await;

    assert!(report.success);
    let statuses: Vec<CleanupStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![CleanupStatus::Deleted, CleanupStatus::NotFound, CleanupStatus::Error]
    );
    assert!(!trimmed.output_path.exists());
    assert!(outside.exists());
}
