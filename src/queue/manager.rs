//! Download job manager
//!
//! Owns the job registry. Every accepted download gets a supervising task
//! that waits for a concurrency permit, runs yt-dlp and records the outcome.
//! Status polls read the registry and fall back to scanning the output
//! directory for ids the registry does not know.

use crate::downloader::{
    find_artifact, DownloadFormat, DownloadQuality, DownloadRequest, ExtractorEngine, FormatSelection,
    ProgressUpdate,
};
use crate::queue::events::{replay, JobEvent, JobLedger};
use crate::queue::job::{DownloadJob, DownloadTicket, JobRecord, JobState, JobStatusReport};
use crate::resolver::{self, PlatformKind};
use crate::utils::config::AppSettings;
use crate::utils::error::LoopError;
use crate::utils::paths::{self, Tool};
use anyhow::Result;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const INTERRUPTED: &str = "interrupted by service restart";

/// Registry entry for one job
struct JobEntry {
    record: JobRecord,
    cancel: CancellationToken,
}

/// What one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub records: usize,
    pub files: usize,
}

/// Download job manager with bounded concurrency
pub struct JobManager {
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
    engine: Arc<ExtractorEngine>,
    semaphore: Arc<Semaphore>,
    output_dir: PathBuf,
    ledger: Option<JobLedger>,
}

impl JobManager {
    pub fn new(engine: ExtractorEngine, output_dir: impl Into<PathBuf>, max_concurrent: usize) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            engine: Arc::new(engine),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            output_dir: output_dir.into(),
            ledger: None,
        }
    }

    /// Persist job events to the given ledger
    pub fn with_ledger(mut self, ledger: JobLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Build the manager from settings, open the ledger and rehydrate from it
    pub async fn from_settings(settings: &AppSettings) -> Result<Self> {
        tokio::fs::create_dir_all(&settings.output_dir).await?;

        let engine = ExtractorEngine::new(
            paths::tool_path_or_name(Tool::YtDlp, settings.ytdlp_path.as_deref()),
            settings.extractor_timeout(),
        );
        let ledger = JobLedger::open(&settings.data_dir).await?;
        let manager =
            Self::new(engine, &settings.output_dir, settings.max_concurrent).with_ledger(ledger);

        let restored = manager.rehydrate().await?;
        if restored > 0 {
            info!("Restored {} job(s) from the ledger", restored);
        }
        Ok(manager)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Validate the URL, register a queued job and start its supervisor.
    /// Returns immediately with the new job id.
    pub async fn start_download(
        &self,
        url: &str,
        format: DownloadFormat,
        quality: DownloadQuality,
    ) -> Result<DownloadTicket, LoopError> {
        let reference = resolver::resolve(url)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let selection = FormatSelection::resolve(format, quality);
        let mut job = DownloadJob {
            job_id: Uuid::new_v4().to_string(),
            url: reference.url,
            platform: reference.platform,
            platform_video_id: reference.platform_video_id,
            format,
            quality,
            output_template: PathBuf::new(),
            selection: selection.selector.clone(),
            created_at: Utc::now(),
        };
        let request = DownloadRequest {
            url: job.url.clone(),
            output_dir: self.output_dir.clone(),
            file_stem: job.file_stem(),
            selection,
        };
        job.output_template = request.output_template();

        let ticket = DownloadTicket {
            download_id: job.job_id.clone(),
            status: "queued".to_string(),
            platform: job.platform,
            video_id: job.platform_video_id.clone(),
            format,
            quality,
        };

        let cancel = CancellationToken::new();
        {
            let mut jobs = self.jobs.lock().await;
            jobs.insert(
                job.job_id.clone(),
                JobEntry {
                    record: JobRecord::new(job.clone()),
                    cancel: cancel.clone(),
                },
            );
        }
        self.log(JobEvent::created(job.clone())).await;

        info!(
            "Queued job {} ({} {}, {} / {})",
            job.job_id, job.platform, job.platform_video_id, format, quality
        );

        let supervisor = Supervisor {
            jobs: Arc::clone(&self.jobs),
            engine: Arc::clone(&self.engine),
            semaphore: Arc::clone(&self.semaphore),
            ledger: self.ledger.clone(),
        };
        tokio::spawn(supervisor.run(job.job_id, request, cancel));

        Ok(ticket)
    }

    /// Report the state of a job.
    ///
    /// Ids the registry does not know are resolved by scanning the output
    /// directory; no match means the job is still processing.
    pub async fn status(&self, platform: PlatformKind, job_id: &str) -> JobStatusReport {
        let record = {
            let jobs = self.jobs.lock().await;
            jobs.get(job_id).map(|entry| entry.record.clone())
        };

        let Some(record) = record else {
            return self.scan_status(platform, job_id).await;
        };

        let platform = record.job.platform;
        match record.state {
            JobState::Queued | JobState::Running => {
                JobStatusReport::processing(job_id, platform, record.progress)
            }
            JobState::Completed => match record.artifact {
                Some(path) => match artifact_report(job_id, platform, &path).await {
                    Some(report) => report,
                    None => JobStatusReport::failed(
                        job_id,
                        platform,
                        record.progress,
                        "artifact is no longer available".to_string(),
                    ),
                },
                None => self.scan_status(platform, job_id).await,
            },
            JobState::Failed(reason) => {
                JobStatusReport::failed(job_id, platform, record.progress, reason)
            }
            JobState::Cancelled => JobStatusReport::cancelled(job_id, platform, record.progress),
        }
    }

    async fn scan_status(&self, platform: PlatformKind, job_id: &str) -> JobStatusReport {
        // Job ids are always UUIDs; anything else cannot have an artifact
        if Uuid::parse_str(job_id).is_ok() {
            if let Some(path) = find_artifact(&self.output_dir, job_id).await {
                if let Some(report) = artifact_report(job_id, platform, &path).await {
                    return report;
                }
            }
        }
        JobStatusReport::processing(job_id, platform, 0.0)
    }

    /// Cancel a queued or running job; its child process is killed
    pub async fn cancel(&self, job_id: &str) -> Result<(), LoopError> {
        {
            let mut jobs = self.jobs.lock().await;
            let entry = jobs
                .get_mut(job_id)
                .ok_or_else(|| LoopError::JobNotFound(job_id.to_string()))?;

            if entry.record.state.is_terminal() {
                return Err(LoopError::InvalidRequest(format!(
                    "job {} has already finished",
                    job_id
                )));
            }

            entry.record.transition(JobState::Cancelled);
            entry.cancel.cancel();
        }

        self.log(JobEvent::cancelled(job_id)).await;
        info!("Cancelled job {}", job_id);
        Ok(())
    }

    /// Snapshot of one record
    pub async fn job(&self, job_id: &str) -> Option<JobRecord> {
        let jobs = self.jobs.lock().await;
        jobs.get(job_id).map(|entry| entry.record.clone())
    }

    /// Snapshot of all records
    pub async fn records(&self) -> Vec<JobRecord> {
        let jobs = self.jobs.lock().await;
        jobs.values().map(|entry| entry.record.clone()).collect()
    }

    /// Rebuild the registry from the ledger.
    ///
    /// Jobs that were still queued or running when the service stopped are
    /// marked completed if their artifact exists, failed otherwise.
    pub async fn rehydrate(&self) -> Result<usize> {
        let Some(ledger) = &self.ledger else {
            return Ok(0);
        };

        let records = replay(ledger.read_events().await?);
        let count = records.len();

        for (job_id, mut record) in records {
            if !record.state.is_terminal() {
                match find_artifact(&self.output_dir, &job_id).await {
                    Some(path) => {
                        record.transition(JobState::Completed);
                        record.progress = 100.0;
                        record.artifact = Some(path.clone());
                        self.log(JobEvent::completed(&job_id, path)).await;
                    }
                    None => {
                        record.transition(JobState::Failed(INTERRUPTED.to_string()));
                        self.log(JobEvent::failed(&job_id, INTERRUPTED)).await;
                    }
                }
            }

            let mut jobs = self.jobs.lock().await;
            jobs.insert(
                job_id,
                JobEntry {
                    record,
                    cancel: CancellationToken::new(),
                },
            );
        }

        self.compact_ledger().await;
        Ok(count)
    }

    /// Evict finished records and delete artifacts older than `ttl`.
    ///
    /// Record age is measured from its last state change. Files belonging to
    /// any record still in the registry are never touched by the file sweep,
    /// whatever their mtime.
    pub async fn evict_expired(&self, ttl: Duration) -> SweepReport {
        let mut report = SweepReport::default();
        let Ok(ttl_chrono) = chrono::Duration::from_std(ttl) else {
            return report;
        };
        let cutoff = Utc::now() - ttl_chrono;

        let (evicted, known_ids) = {
            let mut jobs = self.jobs.lock().await;
            let expired: Vec<String> = jobs
                .iter()
                .filter(|(_, e)| e.record.state.is_terminal() && e.record.updated_at < cutoff)
                .map(|(id, _)| id.clone())
                .collect();

            let evicted: Vec<JobRecord> = expired
                .iter()
                .filter_map(|id| jobs.remove(id).map(|e| e.record))
                .collect();
            let known: HashSet<String> = jobs.keys().cloned().collect();
            (evicted, known)
        };

        for record in &evicted {
            if let Some(path) = &record.artifact {
                if tokio::fs::remove_file(path).await.is_ok() {
                    report.files += 1;
                }
            }
            self.log(JobEvent::evicted(&record.job.job_id)).await;
        }
        report.records = evicted.len();

        report.files += self.sweep_old_files(ttl, &known_ids).await;

        if report.records > 0 {
            self.compact_ledger().await;
        }

        if report != SweepReport::default() {
            info!(
                "Sweep evicted {} job record(s) and {} file(s)",
                report.records, report.files
            );
        }
        report
    }

    async fn sweep_old_files(&self, ttl: Duration, known_ids: &HashSet<String>) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping file sweep of {:?}: {}", self.output_dir, e);
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if known_ids.iter().any(|id| name.contains(id.as_str())) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if matches!(age, Some(age) if age > ttl) {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove expired artifact {:?}: {}", entry.path(), e),
                }
            }
        }
        removed
    }

    /// Run `evict_expired` every `interval` until the task is aborted
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, ttl: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.evict_expired(ttl).await;
            }
        })
    }

    async fn log(&self, event: JobEvent) {
        log_event(self.ledger.as_ref(), &event).await;
    }

    /// Rewrite the ledger so it holds only what the registry still knows
    async fn compact_ledger(&self) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        match ledger.rewrite(move || self.records()).await {
            Ok(lines) => debug!("Compacted job ledger to {} line(s)", lines),
            Err(e) => warn!("Failed to compact job ledger: {}", e),
        }
    }
}

async fn log_event(ledger: Option<&JobLedger>, event: &JobEvent) {
    if let Some(ledger) = ledger {
        if let Err(e) = ledger.log(event).await {
            warn!("Failed to write job ledger: {}", e);
        }
    }
}

async fn artifact_report(job_id: &str, platform: PlatformKind, path: &Path) -> Option<JobStatusReport> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    Some(JobStatusReport::completed(job_id, platform, file_name, meta.len()))
}

/// State the supervising task needs from the manager
struct Supervisor {
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
    engine: Arc<ExtractorEngine>,
    semaphore: Arc<Semaphore>,
    ledger: Option<JobLedger>,
}

impl Supervisor {
    async fn run(self, job_id: String, request: DownloadRequest, cancel: CancellationToken) {
        // Wait for a slot, unless cancelled first
        let permit = tokio::select! {
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit,
            _ = cancel.cancelled() => {
                debug!("Job {} cancelled while queued", job_id);
                return;
            }
        };
        let _permit = match permit {
            Ok(permit) => permit,
            Err(e) => {
                self.finish(&job_id, JobState::Failed(e.to_string()), None).await;
                return;
            }
        };

        if !self.mark_running(&job_id).await {
            return;
        }
        log_event(self.ledger.as_ref(), &JobEvent::started(&job_id)).await;

        let (progress_tx, mut progress_rx) = mpsc::channel::<ProgressUpdate>(64);

        // Handle progress updates
        let jobs = Arc::clone(&self.jobs);
        let progress_job_id = job_id.clone();
        let progress_task = tokio::spawn(async move {
            while let Some(update) = progress_rx.recv().await {
                let mut jobs = jobs.lock().await;
                match jobs.get_mut(&progress_job_id) {
                    Some(entry) if entry.record.state == JobState::Running => {
                        entry.record.progress = update.percent;
                    }
                    _ => break,
                }
            }
        });

        let outcome = tokio::select! {
            result = self.engine.download(&request, progress_tx) => Some(result),
            _ = cancel.cancelled() => None,
        };
        progress_task.abort();

        match outcome {
            Some(Ok(path)) => {
                info!("Job {} completed: {:?}", job_id, path);
                self.finish(&job_id, JobState::Completed, Some(path)).await;
            }
            Some(Err(e)) => {
                error!("Job {} failed: {}", job_id, e);
                self.finish(&job_id, JobState::Failed(e.to_string()), None).await;
            }
            None => {
                info!("Job {} was cancelled, removing partial files", job_id);
                remove_matching(&request.output_dir, &request.file_stem).await;
            }
        }
    }

    /// Returns false when the job was cancelled or evicted in the meantime
    async fn mark_running(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(job_id) {
            Some(entry) if entry.record.state == JobState::Queued => {
                entry.record.transition(JobState::Running);
                true
            }
            _ => false,
        }
    }

    /// Record the outcome unless the job already reached a terminal state
    async fn finish(&self, job_id: &str, state: JobState, artifact: Option<PathBuf>) {
        let event = {
            let mut jobs = self.jobs.lock().await;
            let Some(entry) = jobs.get_mut(job_id) else {
                return;
            };
            if entry.record.state.is_terminal() {
                return;
            }

            let event = match (&state, &artifact) {
                (JobState::Completed, Some(path)) => JobEvent::completed(job_id, path.clone()),
                (JobState::Failed(reason), _) => JobEvent::failed(job_id, reason.clone()),
                (JobState::Cancelled, _) => JobEvent::cancelled(job_id),
                _ => JobEvent::failed(job_id, "finished without an artifact"),
            };
            if state == JobState::Completed {
                entry.record.progress = 100.0;
            }
            entry.record.artifact = artifact;
            entry.record.transition(state);
            event
        };

        log_event(self.ledger.as_ref(), &event).await;
    }
}

/// Best-effort removal of every file whose name contains `needle`
async fn remove_matching(dir: &Path, needle: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().contains(needle) {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                debug!("Could not remove {:?}: {}", entry.path(), e);
            }
        }
    }
}
