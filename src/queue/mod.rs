pub mod events;
pub mod job;
pub mod manager;

pub use events::{JobEvent, JobLedger};
pub use job::{DownloadJob, DownloadTicket, JobRecord, JobState, JobStatusReport, WireStatus};
pub use manager::{JobManager, SweepReport};
