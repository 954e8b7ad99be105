//! yt-dlp download engine
//!
//! Spawns one yt-dlp process per request, streams its progress lines back to
//! the caller and works out which file it produced. The child is spawned with
//! `kill_on_drop`, so dropping the download future (cancellation) kills it.

use crate::downloader::format::FormatSelection;
use crate::downloader::progress::{parse_progress_line, ProgressUpdate};
use crate::utils::error::LoopError;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Extensions yt-dlp uses for unfinished downloads
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp", "tmp"];

const STDERR_TAIL_LINES: usize = 20;

/// One download to run
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    /// File name without extension; yt-dlp fills in `%(ext)s`
    pub file_stem: String,
    pub selection: FormatSelection,
}

impl DownloadRequest {
    pub fn output_template(&self) -> PathBuf {
        self.output_dir.join(format!("{}.%(ext)s", self.file_stem))
    }
}

/// Runs yt-dlp downloads
#[derive(Debug, Clone)]
pub struct ExtractorEngine {
    ytdlp_path: PathBuf,
    timeout: Duration,
}

impl ExtractorEngine {
    pub fn new(ytdlp_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            timeout,
        }
    }

    pub fn ytdlp_path(&self) -> &Path {
        &self.ytdlp_path
    }

    /// Full argument list for a request
    pub fn build_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args: Vec<String> = [
            "--newline", // one progress line per update, needed without a TTY
            "--progress",
            "--no-warnings",
            "--no-check-certificate",
            "--no-simulate",
            "--no-mtime", // artifact age must reflect the download, not the upload
            "--print",
            "after_move:filepath",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.extend(request.selection.to_args());
        args.push("-o".to_string());
        args.push(request.output_template().to_string_lossy().into_owned());
        args.push(request.url.clone());
        args
    }

    /// Run the download to completion and return the artifact path.
    ///
    /// Progress updates are sent best-effort; a dropped receiver does not
    /// abort the download.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::Sender<ProgressUpdate>,
    ) -> Result<PathBuf, LoopError> {
        let args = self.build_args(request);
        debug!("Spawning {:?} {}", self.ytdlp_path, args.join(" "));

        let mut child = AsyncCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LoopError::from_spawn("yt-dlp", e))?;

        // stdout carries progress lines and the final printed file path
        let stdout_handle = child.stdout.take().map(|stdout| {
            let tx = progress_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                let mut printed_path: Option<PathBuf> = None;
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(update) = parse_progress_line(&line) {
                        let _ = tx.send(update).await;
                        continue;
                    }
                    let trimmed = line.trim();
                    if !trimmed.is_empty() && !trimmed.starts_with('[') {
                        printed_path = Some(PathBuf::from(trimmed));
                    }
                }
                printed_path
            })
        });

        let stderr_handle = child.stderr.take().map(|stderr| {
            let tx = progress_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
                let mut errors: Vec<String> = Vec::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(update) = parse_progress_line(&line) {
                        let _ = tx.send(update).await;
                        continue;
                    }
                    if line.contains("ERROR:") {
                        errors.push(line.trim().to_string());
                    }
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                if errors.is_empty() {
                    tail.into_iter().collect::<Vec<_>>().join("\n").trim().to_string()
                } else {
                    errors.join("\n")
                }
            })
        });
        drop(progress_tx);

        let status = match timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(LoopError::IoError(e)),
            Err(_) => {
                let _ = child.kill().await;
                warn!("yt-dlp timed out after {}s for {}", self.timeout.as_secs(), request.url);
                return Err(LoopError::processing(
                    "yt-dlp",
                    format!("timed out after {} seconds", self.timeout.as_secs()),
                ));
            }
        };

        // Give the readers a moment to drain buffered output
        let printed_path = match stdout_handle {
            Some(handle) => timeout(Duration::from_secs(2), handle)
                .await
                .ok()
                .and_then(|joined| joined.ok())
                .flatten(),
            None => None,
        };
        let stderr_text = match stderr_handle {
            Some(handle) => timeout(Duration::from_secs(2), handle)
                .await
                .ok()
                .and_then(|joined| joined.ok())
                .unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            let message = if stderr_text.is_empty() {
                match status.code() {
                    Some(code) => format!("exited with code {}", code),
                    None => "terminated by signal".to_string(),
                }
            } else {
                stderr_text
            };
            error!("yt-dlp failed for {}: {}", request.url, message);
            return Err(LoopError::processing("yt-dlp", message));
        }

        if let Some(path) = printed_path {
            if tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
                info!("yt-dlp finished: {:?}", path);
                return Ok(path);
            }
            debug!("Printed path {:?} does not exist, scanning output directory", path);
        }

        match find_artifact(&request.output_dir, &request.file_stem).await {
            Some(path) => {
                info!("yt-dlp finished: {:?}", path);
                Ok(path)
            }
            None => Err(LoopError::processing(
                "yt-dlp",
                "exited successfully but produced no output file",
            )),
        }
    }
}

/// True for yt-dlp's in-progress files (`.part`, `.ytdl`, `.temp`)
pub fn is_partial(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    PARTIAL_EXTENSIONS
        .iter()
        .any(|ext| name.ends_with(&format!(".{}", ext)) || name.contains(&format!(".{}.", ext)))
}

/// Find a finished file in `dir` whose name contains `needle`
pub async fn find_artifact(dir: &Path, needle: &str) -> Option<PathBuf> {
    if needle.is_empty() {
        return None;
    }

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot scan {:?}: {}", dir, e);
            return None;
        }
    };

    let mut matches = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.contains(needle) || is_partial(&path) {
            continue;
        }
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            matches.push(path);
        }
    }

    // Deterministic pick when yt-dlp left more than one rendition behind
    matches.sort();
    matches.into_iter().next()
}
