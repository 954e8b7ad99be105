use crate::queue::job::{DownloadJob, JobRecord, JobState};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Events that describe changes to download jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEvent {
    /// A job was accepted and queued
    JobCreated {
        job: DownloadJob,
        timestamp: DateTime<Utc>,
    },
    /// The extractor process was started
    JobStarted {
        job_id: String,
        timestamp: DateTime<Utc>,
    },
    /// The job produced its artifact
    JobCompleted {
        job_id: String,
        artifact: PathBuf,
        timestamp: DateTime<Utc>,
    },
    JobFailed {
        job_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    JobCancelled {
        job_id: String,
        timestamp: DateTime<Utc>,
    },
    /// The record (and its artifact) was evicted by the sweeper
    JobEvicted {
        job_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    pub fn created(job: DownloadJob) -> Self {
        JobEvent::JobCreated {
            job,
            timestamp: Utc::now(),
        }
    }

    pub fn started(job_id: &str) -> Self {
        JobEvent::JobStarted {
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn completed(job_id: &str, artifact: PathBuf) -> Self {
        JobEvent::JobCompleted {
            job_id: job_id.to_string(),
            artifact,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(job_id: &str, error: impl Into<String>) -> Self {
        JobEvent::JobFailed {
            job_id: job_id.to_string(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn cancelled(job_id: &str) -> Self {
        JobEvent::JobCancelled {
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn evicted(job_id: &str) -> Self {
        JobEvent::JobEvicted {
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Replay events into the last known record of every job that was not evicted
pub fn replay(events: Vec<JobEvent>) -> HashMap<String, JobRecord> {
    let mut records: HashMap<String, JobRecord> = HashMap::new();

    for event in events {
        match event {
            JobEvent::JobCreated { job, .. } => {
                records
                    .entry(job.job_id.clone())
                    .or_insert_with(|| JobRecord::new(job));
            }
            JobEvent::JobStarted { job_id, timestamp } => {
                if let Some(record) = records.get_mut(&job_id) {
                    record.state = JobState::Running;
                    record.updated_at = timestamp;
                }
            }
            JobEvent::JobCompleted {
                job_id,
                artifact,
                timestamp,
            } => {
                if let Some(record) = records.get_mut(&job_id) {
                    record.state = JobState::Completed;
                    record.progress = 100.0;
                    record.artifact = Some(artifact);
                    record.updated_at = timestamp;
                }
            }
            JobEvent::JobFailed {
                job_id,
                error,
                timestamp,
            } => {
                if let Some(record) = records.get_mut(&job_id) {
                    record.state = JobState::Failed(error);
                    record.updated_at = timestamp;
                }
            }
            JobEvent::JobCancelled { job_id, timestamp } => {
                if let Some(record) = records.get_mut(&job_id) {
                    record.state = JobState::Cancelled;
                    record.updated_at = timestamp;
                }
            }
            JobEvent::JobEvicted { job_id, .. } => {
                records.remove(&job_id);
            }
        }
    }

    records
}

/// Minimal events that replay back into `record`
pub fn snapshot_events(record: &JobRecord) -> Vec<JobEvent> {
    let job_id = record.job.job_id.clone();
    let timestamp = record.updated_at;

    let mut events = vec![JobEvent::JobCreated {
        job: record.job.clone(),
        timestamp: record.job.created_at,
    }];
    match (&record.state, &record.artifact) {
        (JobState::Queued, _) => {}
        (JobState::Running, _) => events.push(JobEvent::JobStarted { job_id, timestamp }),
        (JobState::Completed, Some(artifact)) => events.push(JobEvent::JobCompleted {
            job_id,
            artifact: artifact.clone(),
            timestamp,
        }),
        (JobState::Completed, None) => events.push(JobEvent::JobFailed {
            job_id,
            error: "finished without an artifact".to_string(),
            timestamp,
        }),
        (JobState::Failed(error), _) => events.push(JobEvent::JobFailed {
            job_id,
            error: error.clone(),
            timestamp,
        }),
        (JobState::Cancelled, _) => events.push(JobEvent::JobCancelled { job_id, timestamp }),
    }
    events
}

/// Append-only JSONL ledger of job events, compacted by `rewrite`
#[derive(Debug, Clone)]
pub struct JobLedger {
    file_path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl JobLedger {
    pub async fn open(base_dir: &Path) -> Result<Self> {
        let file_path = base_dir.join("jobs.jsonl");

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await
            .context("Failed to open job ledger")?;

        Ok(Self {
            file_path,
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append an event to the ledger
    pub async fn log(&self, event: &JobEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Replace the ledger with snapshot events for the given records.
    ///
    /// The snapshot is taken while the writer is locked, so no event can land
    /// in the old file after it was read. The new file is written next to the
    /// ledger and renamed over it. Returns the number of lines written.
    pub async fn rewrite<F, Fut>(&self, snapshot: F) -> Result<usize>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<JobRecord>>,
    {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;

        let mut records = snapshot().await;
        records.sort_by_key(|r| r.job.created_at);

        let mut content = String::new();
        let mut lines = 0;
        for record in &records {
            for event in snapshot_events(record) {
                content.push_str(&serde_json::to_string(&event)?);
                content.push('\n');
                lines += 1;
            }
        }

        let tmp_path = self.file_path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp_path, content.as_bytes())
            .await
            .context("Failed to write compacted job ledger")?;
        tokio::fs::rename(&tmp_path, &self.file_path)
            .await
            .context("Failed to replace job ledger")?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await
            .context("Failed to reopen job ledger")?;
        *writer = BufWriter::new(file);

        debug!("Rewrote job ledger with {} record(s)", records.len());
        Ok(lines)
    }

    /// Read all events back for rehydration; unparseable lines are skipped
    pub async fn read_events(&self) -> Result<Vec<JobEvent>> {
        if !tokio::fs::try_exists(&self.file_path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.file_path).await?;
        let mut events = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JobEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Failed to parse job ledger line: {}. Error: {}", line, e),
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::{DownloadFormat, DownloadQuality};
    use crate::resolver::PlatformKind;

    fn job(id: &str) -> DownloadJob {
        DownloadJob {
            job_id: id.to_string(),
            url: "https://youtu.be/abc12345678".to_string(),
            platform: PlatformKind::YouTube,
            platform_video_id: "abc12345678".to_string(),
            format: DownloadFormat::Video,
            quality: DownloadQuality::Medium,
            output_template: PathBuf::from("/tmp/youtube_abc12345678_x.%(ext)s"),
            selection: "best[height<=720]/best".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ledger_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JobLedger::open(dir.path()).await.unwrap();

        ledger.log(&JobEvent::created(job("a"))).await.unwrap();
        ledger.log(&JobEvent::started("a")).await.unwrap();
        ledger
            .log(&JobEvent::completed("a", PathBuf::from("/tmp/a.mp4")))
            .await
            .unwrap();

        let events = ledger.read_events().await.unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], JobEvent::JobCreated { .. }));
    }

    #[tokio::test]
    async fn test_bad_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JobLedger::open(dir.path()).await.unwrap();
        ledger.log(&JobEvent::created(job("a"))).await.unwrap();

        let mut raw = tokio::fs::read_to_string(ledger.path()).await.unwrap();
        raw.push_str("{not json}\n");
        tokio::fs::write(ledger.path(), raw).await.unwrap();

        assert_eq!(ledger.read_events().await.unwrap().len(), 1);
    }

    #[test]
    fn test_replay_folds_states() {
        let events = vec![
            JobEvent::created(job("a")),
            JobEvent::created(job("b")),
            JobEvent::created(job("c")),
            JobEvent::started("a"),
            JobEvent::failed("b", "ERROR: Video unavailable"),
            JobEvent::completed("c", PathBuf::from("/tmp/c.mp4")),
            JobEvent::evicted("c"),
        ];

        let records = replay(events);
        assert_eq!(records.len(), 2);
        assert_eq!(records["a"].state, JobState::Running);
        assert_eq!(
            records["b"].state,
            JobState::Failed("ERROR: Video unavailable".into())
        );
    }

    #[tokio::test]
    async fn test_rewrite_keeps_only_snapshot_records() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JobLedger::open(dir.path()).await.unwrap();

        let events = vec![
            JobEvent::created(job("a")),
            JobEvent::started("a"),
            JobEvent::completed("a", PathBuf::from("/tmp/a.mp4")),
            JobEvent::created(job("b")),
            JobEvent::failed("b", "ERROR: Video unavailable"),
            JobEvent::evicted("a"),
        ];
        for event in &events {
            ledger.log(event).await.unwrap();
        }
        let surviving: Vec<JobRecord> = replay(ledger.read_events().await.unwrap())
            .into_values()
            .collect();

        let lines = ledger.rewrite(|| std::future::ready(surviving)).await.unwrap();
        assert_eq!(lines, 2);

        let raw = tokio::fs::read_to_string(ledger.path()).await.unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(!dir.path().join("jobs.jsonl.tmp").exists());

        let records = replay(ledger.read_events().await.unwrap());
        assert_eq!(records.len(), 1);
        assert_eq!(records["b"].state, JobState::Failed("ERROR: Video unavailable".into()));

        // Appends after a rewrite go to the new file
        ledger.log(&JobEvent::created(job("c"))).await.unwrap();
        assert_eq!(replay(ledger.read_events().await.unwrap()).len(), 2);
    }

    #[test]
    fn test_snapshot_events_replay_to_same_state() {
        let mut record = JobRecord::new(job("a"));
        record.transition(JobState::Completed);
        record.progress = 100.0;
        record.artifact = Some(PathBuf::from("/tmp/a.mp4"));

        let replayed = replay(snapshot_events(&record));
        assert_eq!(replayed["a"], record);
    }

    #[test]
    fn test_duplicate_creation_keeps_later_state() {
        let records = replay(vec![
            JobEvent::created(job("a")),
            JobEvent::failed("a", "boom"),
            JobEvent::created(job("a")),
        ]);
        assert_eq!(records["a"].state, JobState::Failed("boom".into()));
    }

    #[test]
    fn test_events_for_unknown_jobs_are_ignored() {
        let records = replay(vec![JobEvent::started("ghost"), JobEvent::cancelled("ghost")]);
        assert!(records.is_empty());
    }
}
