//! HTTP server: REST routes under `/api`, artifacts under `/uploads`

pub mod error;
pub mod routes;

use crate::extractor::MetadataFetcher;
use crate::media::MediaTransformService;
use crate::queue::JobManager;
use crate::utils::config::AppSettings;
use anyhow::{Context, Result};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub use error::{ApiError, ApiResult};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<MetadataFetcher>,
    pub jobs: Arc<JobManager>,
    pub media: Arc<MediaTransformService>,
}

impl AppState {
    pub fn new(fetcher: MetadataFetcher, jobs: JobManager, media: MediaTransformService) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            jobs: Arc::new(jobs),
            media: Arc::new(media),
        }
    }

    /// Wire every service from the settings; rehydrates jobs from the ledger
    pub async fn from_settings(settings: &AppSettings) -> Result<Self> {
        let jobs = JobManager::from_settings(settings)
            .await
            .context("Failed to initialize job manager")?;
        Ok(Self::new(
            MetadataFetcher::from_settings(settings),
            jobs,
            MediaTransformService::from_settings(settings),
        ))
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::health))
        .route("/validate", post(routes::validate))
        .route("/metadata", post(routes::metadata))
        .route("/download", post(routes::start_download))
        .route(
            "/download/{platform}/{download_id}/status",
            get(routes::download_status),
        )
        .route(
            "/download/{platform}/{download_id}",
            delete(routes::cancel_download),
        )
        .route("/video/trim", post(routes::trim))
        .route("/video/extract-audio", post(routes::extract_audio))
        .route("/video/merge", post(routes::merge))
        .route("/video/convert", post(routes::convert))
        .route("/video/optimize-wallpaper", post(routes::optimize_wallpaper))
        .route("/video/info", post(routes::video_info))
        .route("/video/cleanup", delete(routes::cleanup))
}

/// Build the full application router
pub fn router(state: AppState, uploads_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api_routes())
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the server until Ctrl+C
pub async fn serve(settings: &AppSettings) -> Result<()> {
    let state = AppState::from_settings(settings).await?;

    let sweeper = state
        .jobs
        .spawn_sweeper(settings.sweep_interval(), settings.artifact_ttl());

    let app = router(state, &settings.output_dir);

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr))?;
    info!("Listening on http://{}", settings.bind_addr);
    info!("Serving artifacts from {:?}", settings.output_dir);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
    }
}
