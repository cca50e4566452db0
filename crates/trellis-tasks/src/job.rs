//! Job identity, status, and bookkeeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use trellis_core::JobKind;
use uuid::Uuid;

/// Unique identifier for a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a new, time-ordered job ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting behind earlier jobs of the same response.
    Pending,
    /// Currently running.
    Running,
    /// Finished normally.
    Completed,
    /// Panicked.
    Failed,
    /// Exceeded the configured job timeout.
    TimedOut,
}

impl JobStatus {
    /// Returns true once the job can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Returns true if the job did not finish normally.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }

    /// Returns the label used in logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the runner remembers about one job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    /// Job identifier.
    pub id: JobId,
    /// Where the job runs.
    pub kind: JobKind,
    /// Position within the response's job queue.
    pub position: usize,
    /// Current status.
    pub status: JobStatus,
    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When the job started running.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Panic message, if the job failed.
    pub error: Option<String>,
}

impl JobRecord {
    /// Creates a pending record.
    pub fn new(id: JobId, kind: JobKind, position: usize) -> Self {
        Self {
            id,
            kind,
            position,
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Marks the job as running.
    pub fn mark_started(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Marks the job as finished normally.
    pub fn mark_completed(&mut self) {
        self.finish(JobStatus::Completed);
    }

    /// Marks the job as failed with a panic message.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(JobStatus::Failed);
    }

    /// Marks the job as timed out.
    pub fn mark_timed_out(&mut self) {
        self.finish(JobStatus::TimedOut);
    }

    fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Returns how long the job ran, once finished.
    pub fn duration(&self) -> Option<Duration> {
        let elapsed = self.finished_at? - self.started_at?;
        elapsed.to_std().ok()
    }
}

/// Runner-wide job counters.
#[derive(Debug, Default)]
pub struct JobStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    running: AtomicU64,
}

impl JobStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self, count: u64) {
        self.submitted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_started(&self) {
        self.running.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_finished(&self, status: JobStatus) {
        let counter = match status {
            JobStatus::Completed => &self.completed,
            JobStatus::Failed => &self.failed,
            JobStatus::TimedOut => &self.timed_out,
            JobStatus::Pending | JobStatus::Running => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.running.fetch_sub(1, Ordering::Relaxed);
    }

    /// Total jobs accepted.
    pub fn total_submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Jobs that finished normally.
    pub fn total_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Jobs that panicked.
    pub fn total_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Jobs that exceeded the timeout.
    pub fn total_timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Jobs running right now.
    pub fn currently_running(&self) -> u64 {
        self.running.load(Ordering::Relaxed)
    }

    /// Jobs accepted but not yet finished.
    pub fn outstanding(&self) -> u64 {
        let finished = self.total_completed() + self.total_failed() + self.total_timed_out();
        self.total_submitted().saturating_sub(finished)
    }
}
