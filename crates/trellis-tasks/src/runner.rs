//! Background job runner.
//!
//! Each submitted [`JobQueue`] becomes one runtime task that works through
//! the queue in order. Event-loop jobs are awaited in place, thread jobs go
//! to the blocking pool. A job that panics or times out is recorded and the
//! rest of its queue still runs.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use trellis_core::{Job, JobQueue};

use crate::error::{JobError, JobResult};
use crate::job::{JobId, JobRecord, JobStats, JobStatus};

/// Configuration for the background runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound on a single job's run time. `None` means unbounded.
    pub job_timeout: Option<Duration>,
    /// How long [`BackgroundRunner::shutdown`] waits for in-flight jobs.
    pub drain_timeout: Duration,
    /// Whether to keep a record per job.
    pub track_history: bool,
    /// Maximum number of kept records. Finished records are evicted when
    /// the limit is reached; past it, new jobs run unrecorded.
    pub max_history: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            job_timeout: None,
            drain_timeout: Duration::from_secs(30),
            track_history: true,
            max_history: 10_000,
        }
    }
}

impl RunnerConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds each job's run time.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    /// Sets the shutdown drain timeout.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Stops recording per-job history. Counters are still kept.
    pub fn without_history(mut self) -> Self {
        self.track_history = false;
        self
    }

    /// Caps the number of kept job records.
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }
}

enum Outcome {
    Completed,
    Failed(String),
    TimedOut,
}

/// Runs the jobs attached to finished responses.
#[derive(Debug)]
pub struct BackgroundRunner {
    config: RunnerConfig,
    registry: DashMap<JobId, Arc<RwLock<JobRecord>>>,
    stats: Arc<JobStats>,
    idle: Arc<Notify>,
    shutdown: AtomicBool,
}

impl BackgroundRunner {
    /// Creates a runner with default configuration.
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Creates a runner with custom configuration.
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            config,
            registry: DashMap::new(),
            stats: Arc::new(JobStats::new()),
            idle: Arc::new(Notify::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Returns the job counters.
    pub fn stats(&self) -> &JobStats {
        &self.stats
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Returns true if every submitted job has finished.
    pub fn is_idle(&self) -> bool {
        self.stats.outstanding() == 0
    }

    /// Returns the record of one job.
    pub fn job(&self, id: JobId) -> Option<JobRecord> {
        self.registry.get(&id).map(|entry| entry.read().clone())
    }

    /// Returns every recorded job, oldest first.
    pub fn jobs(&self) -> Vec<JobRecord> {
        let mut records: Vec<_> = self
            .registry
            .iter()
            .map(|entry| entry.value().read().clone())
            .collect();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Returns the recorded jobs with the given status.
    pub fn jobs_by_status(&self, status: JobStatus) -> Vec<JobRecord> {
        self.jobs()
            .into_iter()
            .filter(|record| record.status == status)
            .collect()
    }

    /// Drops the records of finished jobs and returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let before = self.registry.len();
        self.registry
            .retain(|_, record| !record.read().status.is_terminal());
        before - self.registry.len()
    }

    /// Schedules a response's jobs.
    ///
    /// The jobs run one after another in queue order on a new runtime task;
    /// this call does not wait for them. Must be called from within a Tokio
    /// runtime.
    pub fn submit(&self, jobs: JobQueue) -> JobResult<Vec<JobId>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        if self.is_shutdown() {
            return Err(JobError::ShutDown);
        }
        let runtime = Handle::try_current().map_err(|e| JobError::no_runtime(e.to_string()))?;

        let mut ids = Vec::with_capacity(jobs.len());
        let batch: Vec<_> = jobs
            .into_iter()
            .enumerate()
            .map(|(position, job)| {
                let id = JobId::new();
                let record = Arc::new(RwLock::new(JobRecord::new(id, job.kind(), position)));
                if self.config.track_history && self.has_record_room() {
                    self.registry.insert(id, Arc::clone(&record));
                }
                ids.push(id);
                (job, record)
            })
            .collect();

        self.stats.record_submitted(batch.len() as u64);
        debug!(jobs = batch.len(), "submitting background jobs");

        let stats = Arc::clone(&self.stats);
        let idle = Arc::clone(&self.idle);
        let timeout = self.config.job_timeout;
        runtime.spawn(async move {
            for (job, record) in batch {
                run_job(job, &record, &stats, timeout).await;
                if stats.outstanding() == 0 {
                    idle.notify_waiters();
                }
            }
        });
        Ok(ids)
    }

    fn has_record_room(&self) -> bool {
        if self.registry.len() < self.config.max_history {
            return true;
        }
        let pruned = self.prune_finished();
        if self.registry.len() < self.config.max_history {
            debug!(pruned, "evicted finished job records");
            return true;
        }
        debug!(
            max_history = self.config.max_history,
            "job history full, running job unrecorded"
        );
        false
    }

    /// Waits until every submitted job has finished, including jobs
    /// submitted while waiting.
    ///
    /// Any number of callers may wait at once.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a wake-up between the two is kept.
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Like [`wait_idle`](Self::wait_idle), bounded by `limit`.
    ///
    /// On timeout the jobs keep running. A later drain or wait still
    /// waits for them.
    pub async fn drain(&self, limit: Duration) -> JobResult<()> {
        tokio::time::timeout(limit, self.wait_idle())
            .await
            .map_err(|_| JobError::DrainTimeout(limit))
    }

    /// Stops accepting jobs and drains the ones in flight.
    pub async fn shutdown(&self) -> JobResult<()> {
        info!("shutting down background runner");
        self.shutdown.store(true, Ordering::Release);

        let result = self.drain(self.config.drain_timeout).await;
        match &result {
            Ok(()) => info!("background runner shutdown complete"),
            Err(e) => warn!(
                outstanding = self.stats.outstanding(),
                error = %e,
                "shutdown timeout reached, jobs still running"
            ),
        }
        result
    }
}

impl Default for BackgroundRunner {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job(
    job: Job,
    record: &RwLock<JobRecord>,
    stats: &JobStats,
    timeout: Option<Duration>,
) {
    let kind = job.kind();
    let id = {
        let mut record = record.write();
        record.mark_started();
        record.id
    };
    stats.record_started();

    let outcome = match job {
        Job::EventLoop(future) => {
            bounded(
                async move {
                    AssertUnwindSafe(future)
                        .catch_unwind()
                        .await
                        .map_err(|payload| panic_message(payload.as_ref()))
                },
                timeout,
            )
            .await
        }
        Job::Thread(work) => {
            bounded(
                async move {
                    match tokio::task::spawn_blocking(work).await {
                        Ok(()) => Ok(()),
                        Err(e) if e.is_panic() => Err(panic_message(e.into_panic().as_ref())),
                        Err(e) => Err(e.to_string()),
                    }
                },
                timeout,
            )
            .await
        }
    };

    let status = {
        let mut record = record.write();
        match outcome {
            Outcome::Completed => {
                debug!(job_id = %id, kind = %kind, "background job completed");
                record.mark_completed();
            }
            Outcome::Failed(error) => {
                warn!(job_id = %id, kind = %kind, error = %error, "background job panicked");
                record.mark_failed(error);
            }
            Outcome::TimedOut => {
                warn!(job_id = %id, kind = %kind, "background job timed out");
                record.mark_timed_out();
            }
        }
        record.status
    };

    stats.record_finished(status);
    trellis_telemetry::record_background_job(kind.as_str(), status.as_str());
}

async fn bounded<F>(work: F, timeout: Option<Duration>) -> Outcome
where
    F: Future<Output = Result<(), String>>,
{
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => return Outcome::TimedOut,
        },
        None => work.await,
    };
    match result {
        Ok(()) => Outcome::Completed,
        Err(message) => Outcome::Failed(message),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "job panicked".to_string()
    }
}
