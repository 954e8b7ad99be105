//! Loopforge - local video acquisition and transformation service
//!
//! Serves the REST API by default. `--test-download` runs one download
//! headless and exits.

use anyhow::{bail, Result};
use clap::Parser;
use loopforge::downloader::{DownloadFormat, DownloadQuality};
use loopforge::queue::{JobManager, WireStatus};
use loopforge::server;
use loopforge::utils::{find_tool, AppSettings, Tool};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "loopforge", version, about)]
struct Args {
    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind, e.g. 127.0.0.1:5000
    #[arg(long)]
    bind: Option<String>,

    /// Directory for downloaded and transformed artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Test download with provided URL
    #[arg(long)]
    test_download: Option<String>,

    /// Format for --test-download (video, audio, videoandaudio)
    #[arg(long, default_value = "videoandaudio")]
    format: String,

    /// Quality for --test-download (low, medium, high, highest)
    #[arg(long, default_value = "highest")]
    quality: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut settings = AppSettings::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }

    check_tools(&settings);

    if let Some(url) = args.test_download {
        let format: DownloadFormat = args.format.parse().map_err(anyhow::Error::msg)?;
        let quality: DownloadQuality = args.quality.parse().map_err(anyhow::Error::msg)?;
        return test_download_cli(&settings, &url, format, quality).await;
    }

    server::serve(&settings).await
}

fn check_tools(settings: &AppSettings) {
    let tools = [
        (Tool::YtDlp, settings.ytdlp_path.as_deref()),
        (Tool::Ffmpeg, settings.ffmpeg_path.as_deref()),
        (Tool::Ffprobe, settings.ffprobe_path.as_deref()),
        (Tool::Browser, settings.browser_path.as_deref()),
    ];

    for (tool, override_path) in tools {
        if find_tool(tool, override_path).is_none() {
            tracing::warn!(
                "{} not found; features that need it will report an error",
                tool.name()
            );
        }
    }
}

async fn test_download_cli(
    settings: &AppSettings,
    url: &str,
    format: DownloadFormat,
    quality: DownloadQuality,
) -> Result<()> {
    println!("Testing download: {}", url);

    let manager = JobManager::from_settings(settings).await?;
    let ticket = manager.start_download(url, format, quality).await?;
    println!(
        "Job {} ({} {}) started",
        ticket.download_id, ticket.platform, ticket.video_id
    );

    let mut last_progress = -1.0;
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let report = manager.status(ticket.platform, &ticket.download_id).await;

        match report.status {
            WireStatus::Processing => {
                if (report.progress - last_progress).abs() >= 1.0 {
                    println!("Progress: {:.1}%", report.progress);
                    last_progress = report.progress;
                }
            }
            WireStatus::Completed => {
                println!(
                    "Download completed: {} ({} bytes)",
                    report.file_name.unwrap_or_default(),
                    report.size.unwrap_or_default()
                );
                return Ok(());
            }
            WireStatus::Failed => {
                bail!(
                    "Download failed: {}",
                    report.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
            WireStatus::Cancelled => bail!("Download cancelled"),
        }
    }
}
