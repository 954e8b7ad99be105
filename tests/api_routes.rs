//! REST surface over a real listener, with fake tools behind it.

#![cfg(unix)]

mod common;

use common::{write_script, FFMPEG_OK, FFPROBE_OK, YOUTUBE_URL, YTDLP_OK};
use loopforge::downloader::ExtractorEngine;
use loopforge::extractor::MetadataFetcher;
use loopforge::media::{FfmpegRunner, MediaTransformService};
use loopforge::queue::JobManager;
use loopforge::server::{router, AppState};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestServer {
    _temp: TempDir,
    base: String,
    uploads: PathBuf,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let tools = temp.path().join("bin");
        std::fs::create_dir_all(&tools).expect("tools dir");
        let uploads = temp.path().join("uploads");
        std::fs::create_dir_all(&uploads).expect("uploads dir");

        let ytdlp = write_script(&tools, "yt-dlp", YTDLP_OK);
        let ffmpeg = write_script(&tools, "ffmpeg", FFMPEG_OK);
        let ffprobe = write_script(&tools, "ffprobe", FFPROBE_OK);

        let state = AppState::new(
            MetadataFetcher::new(None, None, None),
            JobManager::new(ExtractorEngine::new(ytdlp, Duration::from_secs(20)), &uploads, 2),
            MediaTransformService::new(
                FfmpegRunner::new(ffmpeg, ffprobe, Duration::from_secs(10)),
                &uploads,
            ),
        );
        let app = router(state, &uploads);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            _temp: temp,
            base: format!("http://{}", addr),
            uploads,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self.client.post(self.url(path)).json(&body).send().await.expect("request");
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.expect("request");
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn delete(&self, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut req = self.client.delete(self.url(path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.expect("request");
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/api/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn validate_accepts_and_rejects_urls() {
    let server = TestServer::start().await;

    let (status, body) = server.post("/api/validate", json!({ "url": YOUTUBE_URL })).await;
    assert_eq!(status, 200);
    assert_eq!(body["valid"], true);
    assert_eq!(body["platform"], "youtube");
    assert_eq!(body["videoId"], "dQw4w9WgXcQ");

    let (status, body) = server
        .post("/api/validate", json!({ "url": "https://vimeo.com/1234" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid URL");
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let server = TestServer::start().await;
    let (status, _) = server.post("/api/validate", json!({ "link": YOUTUBE_URL })).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn metadata_falls_back_to_placeholder() {
    let server = TestServer::start().await;
    let (status, body) = server.post("/api/metadata", json!({ "url": YOUTUBE_URL })).await;
    assert_eq!(status, 200);
    assert_eq!(body["sources"], json!(["placeholder"]));
}

#[tokio::test]
async fn download_then_fetch_artifact() {
    let server = TestServer::start().await;

    let (status, ticket) = server
        .post(
            "/api/download",
            json!({ "url": YOUTUBE_URL, "format": "video", "quality": "medium" }),
        )
        .await;
    assert_eq!(status, 200);
    let id = ticket["downloadId"].as_str().expect("download id").to_string();
    assert_eq!(ticket["platform"], "youtube");

    let status_path = format!("/api/download/youtube/{}/status", id);
    let mut report = Value::Null;
    for _ in 0..200 {
        let (code, body) = server.get(&status_path).await;
        assert_eq!(code, 200);
        if body["status"] != "processing" {
            report = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(report["status"], "completed", "{}", report);

    let download_url = report["downloadUrl"].as_str().expect("download url");
    let bytes = server
        .client
        .get(server.url(download_url))
        .send()
        .await
        .expect("fetch artifact")
        .bytes()
        .await
        .expect("artifact body");
    assert_eq!(&bytes[..], b"fake video bytes");

    // Finished jobs cannot be cancelled
    let (code, _) = server.delete(&format!("/api/download/youtube/{}", id), None).await;
    assert_eq!(code, 400);
}

#[tokio::test]
async fn download_rejects_unknown_options() {
    let server = TestServer::start().await;
    let (status, _) = server
        .post("/api/download", json!({ "url": YOUTUBE_URL, "quality": "ultra" }))
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn status_and_cancel_edge_cases() {
    let server = TestServer::start().await;

    let (code, _) = server.get("/api/download/vimeo/abc/status").await;
    assert_eq!(code, 404);

    let (code, body) = server.get("/api/download/youtube/not-a-job/status").await;
    assert_eq!(code, 200);
    assert_eq!(body["status"], "processing");
    assert_eq!(body["progress"], 0.0);

    let (code, _) = server.delete("/api/download/youtube/not-a-job", None).await;
    assert_eq!(code, 404);
}

#[tokio::test]
async fn video_routes_round_trip() {
    let server = TestServer::start().await;
    let input = server.uploads.join("source.mp4");
    std::fs::write(&input, b"source").expect("input");

    let (code, trimmed) = server
        .post(
            "/api/video/trim",
            json!({ "inputPath": input, "startTime": 1.0, "endTime": 3.0 }),
        )
        .await;
    assert_eq!(code, 200);
    assert_eq!(trimmed["success"], true);

    let (code, wallpaper) = server
        .post(
            "/api/video/optimize-wallpaper",
            json!({ "inputPath": input, "targetSize": "huge" }),
        )
        .await;
    assert_eq!(code, 200);
    assert!(wallpaper["settings"].is_object());

    let (code, info) = server.post("/api/video/info", json!({ "inputPath": input })).await;
    assert_eq!(code, 200);
    assert_eq!(info["fileName"], "source.mp4");
    assert_eq!(info["container"], "mov");

    let (code, _) = server
        .post(
            "/api/video/trim",
            json!({ "inputPath": input, "startTime": 4.0, "endTime": 3.0 }),
        )
        .await;
    assert_eq!(code, 400);

    let (code, _) = server
        .post("/api/video/info", json!({ "inputPath": server.uploads.join("nope.mp4") }))
        .await;
    assert_eq!(code, 404);

    let (code, report) = server
        .delete(
            "/api/video/cleanup",
            Some(json!({ "filePaths": [trimmed["outputPath"], wallpaper["outputPath"]] })),
        )
        .await;
    assert_eq!(code, 200);
    assert_eq!(report["results"][0]["status"], "deleted");
    assert_eq!(report["results"][1]["status"], "deleted");
}
