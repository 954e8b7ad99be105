//! REST handlers under `/api`

use crate::downloader::{DownloadFormat, DownloadQuality};
use crate::extractor::VideoMetadata;
use crate::media::{CleanupReport, ConvertQuality, MediaProbe, TransformResult, WallpaperSize};
use crate::queue::{DownloadTicket, JobStatusReport};
use crate::resolver::{self, PlatformKind};
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;
use crate::utils::error::LoopError;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{debug, info};

type JsonBody<T> = Result<Json<T>, JsonRejection>;

fn body<T>(payload: JsonBody<T>) -> ApiResult<T> {
    payload.map(|Json(inner)| inner).map_err(ApiError::from)
}

fn platform_param(raw: &str) -> ApiResult<PlatformKind> {
    raw.parse::<PlatformKind>()
        .map_err(|_| ApiError::not_found(format!("Unsupported platform: {}", raw)))
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub video_id: String,
    pub platform: PlatformKind,
}

#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    pub url: String,
    pub format: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimRequest {
    pub input_path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
    pub output_format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractAudioRequest {
    pub input_path: PathBuf,
    pub output_format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub output_format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub input_path: PathBuf,
    pub output_format: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperRequest {
    pub input_path: PathBuf,
    pub target_size: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoRequest {
    pub input_path: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub file_name: Option<String>,
    pub file_path: PathBuf,
    #[serde(flatten)]
    pub probe: MediaProbe,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    pub file_paths: Vec<PathBuf>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "loopforge",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn validate(payload: JsonBody<UrlRequest>) -> ApiResult<Json<ValidateResponse>> {
    let request = body(payload)?;
    let reference = resolver::resolve(&request.url).map_err(LoopError::from)?;

    Ok(Json(ValidateResponse {
        valid: true,
        video_id: reference.platform_video_id,
        platform: reference.platform,
    }))
}

pub async fn metadata(
    State(state): State<AppState>,
    payload: JsonBody<UrlRequest>,
) -> ApiResult<Json<VideoMetadata>> {
    let request = body(payload)?;
    let metadata = state
        .fetcher
        .fetch_metadata(&request.url)
        .await
        .map_err(|e| ApiError::from(e).with_fallback())?;

    debug!("Metadata for {} from {:?}", request.url, metadata.sources);
    Ok(Json(metadata))
}

pub async fn start_download(
    State(state): State<AppState>,
    payload: JsonBody<DownloadBody>,
) -> ApiResult<Json<DownloadTicket>> {
    let request = body(payload)?;

    let format = match request.format.as_deref() {
        Some(raw) => raw.parse::<DownloadFormat>().map_err(ApiError::bad_request)?,
        None => DownloadFormat::default(),
    };
    let quality = match request.quality.as_deref() {
        Some(raw) => raw.parse::<DownloadQuality>().map_err(ApiError::bad_request)?,
        None => DownloadQuality::default(),
    };

    let ticket = state.jobs.start_download(&request.url, format, quality).await?;
    Ok(Json(ticket))
}

pub async fn download_status(
    State(state): State<AppState>,
    Path((platform, download_id)): Path<(String, String)>,
) -> ApiResult<Json<JobStatusReport>> {
    let platform = platform_param(&platform)?;
    Ok(Json(state.jobs.status(platform, &download_id).await))
}

pub async fn cancel_download(
    State(state): State<AppState>,
    Path((platform, download_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    platform_param(&platform)?;
    state.jobs.cancel(&download_id).await?;
    info!("Download {} cancelled by client", download_id);

    Ok(Json(json!({
        "downloadId": download_id,
        "status": "cancelled",
    })))
}

pub async fn trim(
    State(state): State<AppState>,
    payload: JsonBody<TrimRequest>,
) -> ApiResult<Json<TransformResult>> {
    let request = body(payload)?;
    let result = state
        .media
        .trim(
            &request.input_path,
            request.start_time,
            request.end_time,
            request.output_format.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

pub async fn extract_audio(
    State(state): State<AppState>,
    payload: JsonBody<ExtractAudioRequest>,
) -> ApiResult<Json<TransformResult>> {
    let request = body(payload)?;
    let result = state
        .media
        .extract_audio(&request.input_path, request.output_format.as_deref())
        .await?;
    Ok(Json(result))
}

pub async fn merge(
    State(state): State<AppState>,
    payload: JsonBody<MergeRequest>,
) -> ApiResult<Json<TransformResult>> {
    let request = body(payload)?;
    let result = state
        .media
        .merge(
            &request.video_path,
            &request.audio_path,
            request.output_format.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

pub async fn convert(
    State(state): State<AppState>,
    payload: JsonBody<ConvertRequest>,
) -> ApiResult<Json<TransformResult>> {
    let request = body(payload)?;
    let quality = ConvertQuality::from_name(request.quality.as_deref());
    let result = state
        .media
        .convert(&request.input_path, request.output_format.as_deref(), quality)
        .await?;
    Ok(Json(result))
}

pub async fn optimize_wallpaper(
    State(state): State<AppState>,
    payload: JsonBody<WallpaperRequest>,
) -> ApiResult<Json<TransformResult>> {
    let request = body(payload)?;
    let size = WallpaperSize::from_name(request.target_size.as_deref());
    let result = state
        .media
        .optimize_wallpaper(&request.input_path, size)
        .await?;
    Ok(Json(result))
}

pub async fn video_info(
    State(state): State<AppState>,
    payload: JsonBody<InfoRequest>,
) -> ApiResult<Json<InfoResponse>> {
    let request = body(payload)?;
    let probe = state.media.probe(&request.input_path).await?;

    Ok(Json(InfoResponse {
        file_name: request
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
        file_path: request.input_path,
        probe,
    }))
}

pub async fn cleanup(
    State(state): State<AppState>,
    payload: JsonBody<CleanupRequest>,
) -> ApiResult<Json<CleanupReport>> {
    let request = body(payload)?;
    Ok(Json(state.media.cleanup(&request.file_paths).await))
}
