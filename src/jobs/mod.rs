//! Periodic background jobs.
//!
//! A [`WorkerJob`] runs on its own group of workers, separate from the HTTP
//! workers, so a slow job never stalls request handling. Each job worker
//! runs the job's startup hook once, then fires the task every `interval`
//! until shutdown.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use workhall::jobs::WorkerJob;
//!
//! let job = WorkerJob::new(Duration::from_secs(10), || tracing::info!("tick"))
//!     .with_name("heartbeat")
//!     .with_workers(2);
//! runtime.add_job(job)?;
//! ```

mod timer;

pub use timer::{TimerId, Timers};

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigError;
use crate::types::{Hook, JobTask};

/// A periodic task and the workers that run it.
#[derive(Clone)]
pub struct WorkerJob {
    name: String,
    interval: Duration,
    task: JobTask,
    workers: usize,
    on_start: Option<Hook>,
}

impl WorkerJob {
    /// Run `task` every `interval` on one worker.
    pub fn new<F>(interval: Duration, task: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            name: String::new(),
            interval,
            task: Arc::new(task),
            workers: 1,
            on_start: None,
        }
    }

    /// Diagnostic label used in logs and thread names.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of workers running this job.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Hook run once on each job worker before its timer is armed.
    pub fn with_on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(hook));
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[inline]
    pub(crate) fn task(&self) -> &JobTask {
        &self.task
    }

    #[inline]
    pub(crate) fn on_start(&self) -> Option<&Hook> {
        self.on_start.as_ref()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut invalid = Vec::new();
        if self.interval.is_zero() {
            invalid.push("interval");
        }
        if self.workers == 0 {
            invalid.push("workers");
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::invalid(invalid))
        }
    }
}

impl fmt::Debug for WorkerJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerJob")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("workers", &self.workers)
            .field("on_start", &self.on_start.is_some())
            .finish()
    }
}

/// Jobs registered on one runtime, frozen once it starts.
#[derive(Clone, Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<Arc<WorkerJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register `job`. Unnamed jobs are called `job-<n>`.
    pub fn add(&mut self, mut job: WorkerJob) -> Result<(), ConfigError> {
        job.validate()?;
        if job.name.is_empty() {
            job.name = format!("job-{}", self.jobs.len() + 1);
        }

        tracing::debug!(
            job = %job.name,
            interval_ms = job.interval.as_millis() as u64,
            workers = job.workers,
            "job registered"
        );
        self.jobs.push(Arc::new(job));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkerJob>> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Total job workers across all jobs.
    pub fn worker_count(&self) -> usize {
        self.jobs.iter().map(|j| j.workers).sum()
    }
}

/// What a job worker knows about itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobWorkerContext {
    pub job_name: String,
    /// Index of this worker within the job's group.
    pub worker_index: usize,
    /// Timers armed on this worker.
    pub timer_ids: Vec<TimerId>,
}

thread_local! {
    static CURRENT_WORKER: RefCell<Option<JobWorkerContext>> = const { RefCell::new(None) };
}

/// Context of the job worker running on this thread, if any.
///
/// Available to job tasks; `None` on HTTP workers and foreign threads.
pub fn current_worker() -> Option<JobWorkerContext> {
    CURRENT_WORKER.with(|c| c.borrow().clone())
}

pub(crate) fn set_current_worker(ctx: Option<JobWorkerContext>) {
    CURRENT_WORKER.with(|c| *c.borrow_mut() = ctx);
}
