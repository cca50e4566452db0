//! Background jobs attached to a response.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// The future type of an event-loop job.
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Where a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Awaited on the async runtime.
    EventLoop,
    /// Run on the blocking thread pool.
    Thread,
}

impl JobKind {
    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventLoop => "event_loop",
            Self::Thread => "thread",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of deferred work.
pub enum Job {
    /// A future awaited on the runtime.
    EventLoop(JobFuture),
    /// A closure run on a worker thread.
    Thread(Box<dyn FnOnce() + Send + 'static>),
}

impl Job {
    /// Creates an event-loop job.
    pub fn event_loop<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::EventLoop(Box::pin(future))
    }

    /// Creates a thread job.
    pub fn thread<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::Thread(Box::new(f))
    }

    /// Returns where the job runs.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self {
            Self::EventLoop(_) => JobKind::EventLoop,
            Self::Thread(_) => JobKind::Thread,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Job").field(&self.kind()).finish()
    }
}

/// An ordered queue of jobs. Jobs run in the order they were scheduled.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
}

impl JobQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job.
    pub fn push(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    /// Removes and returns the next job.
    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Returns the number of queued jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if no jobs are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Returns the kinds of the queued jobs, in order.
    pub fn kinds(&self) -> impl Iterator<Item = JobKind> + '_ {
        self.jobs.iter().map(Job::kind)
    }
}

impl IntoIterator for JobQueue {
    type Item = Job;
    type IntoIter = std::collections::vec_deque::IntoIter<Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

impl Extend<Job> for JobQueue {
    fn extend<I: IntoIterator<Item = Job>>(&mut self, iter: I) {
        self.jobs.extend(iter);
    }
}
