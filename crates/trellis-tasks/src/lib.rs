//! # Trellis Tasks
//!
//! Runs the background jobs a response schedules.
//!
//! Jobs are handed over only after the response is final. Each response's
//! queue runs in order on its own runtime task:
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use trellis_core::{Job, JobQueue};
//! use trellis_tasks::BackgroundRunner;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = BackgroundRunner::new();
//!     let counter = Arc::new(AtomicUsize::new(0));
//!
//!     let mut queue = JobQueue::new();
//!     let c = Arc::clone(&counter);
//!     queue.push(Job::event_loop(async move {
//!         c.fetch_add(2, Ordering::SeqCst);
//!     }));
//!     let c = Arc::clone(&counter);
//!     queue.push(Job::thread(move || {
//!         c.fetch_add(2000, Ordering::SeqCst);
//!     }));
//!
//!     runner.submit(queue).unwrap();
//!     runner.wait_idle().await;
//!     assert_eq!(counter.load(Ordering::SeqCst), 2002);
//! }
//! ```
//!
//! A panicking or timed-out job is recorded as failed and the next job in
//! the queue still runs. Finished jobs are counted in the
//! `trellis_background_jobs_total` metric.

mod error;
mod job;
mod runner;

pub use error::{JobError, JobResult};
pub use job::{JobId, JobRecord, JobStats, JobStatus};
pub use runner::{BackgroundRunner, RunnerConfig};
