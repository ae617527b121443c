use super::context::JobContext;
use super::job::{BackgroundJob, JobError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Upper bound on how long the loop sleeps when nothing is due.
const MAX_IDLE: Duration = Duration::from_secs(60);

/// How long shutdown waits for a running job to notice cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Manages background job scheduling and execution.
///
/// Every registered job runs once as soon as the scheduler starts, then again
/// `interval` after each run finishes. A job never overlaps with itself.
pub struct JobScheduler {
    jobs: HashMap<&'static str, Arc<dyn BackgroundJob>>,

    /// When each idle job is due next. Running jobs have no entry.
    next_runs: HashMap<&'static str, Instant>,

    running_handles: HashMap<&'static str, JoinHandle<()>>,

    completion_sender: mpsc::UnboundedSender<&'static str>,
    completion_receiver: mpsc::UnboundedReceiver<&'static str>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,

    /// Shared context provided to jobs during execution.
    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(shutdown_token: CancellationToken, job_context: JobContext) -> Self {
        let (completion_sender, completion_receiver) = mpsc::unbounded_channel();
        Self {
            jobs: HashMap::new(),
            next_runs: HashMap::new(),
            running_handles: HashMap::new(),
            completion_sender,
            completion_receiver,
            shutdown_token,
            job_context,
        }
    }

    /// Register a job with the scheduler. It becomes due immediately.
    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id();
        info!(
            "Registering job: {} - {} (every {:?})",
            job_id,
            job.description(),
            job.interval()
        );
        self.next_runs.insert(job_id, Instant::now());
        self.jobs.insert(job_id, job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Main scheduler loop. Returns once the shutdown token is cancelled and
    /// running jobs have wound down.
    pub async fn run(mut self) {
        info!("Starting job scheduler with {} registered jobs", self.job_count());

        loop {
            self.run_due_jobs();

            let sleep_duration = self.time_until_next_scheduled_job();
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {}
                Some(job_id) = self.completion_receiver.recv() => {
                    self.on_job_finished(job_id);
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    fn time_until_next_scheduled_job(&self) -> Duration {
        let now = Instant::now();
        self.next_runs
            .values()
            .map(|next_run| next_run.saturating_duration_since(now))
            .min()
            .unwrap_or(MAX_IDLE)
            .min(MAX_IDLE)
    }

    fn run_due_jobs(&mut self) {
        let now = Instant::now();
        let due: Vec<&'static str> = self
            .next_runs
            .iter()
            .filter(|(_, next_run)| **next_run <= now)
            .map(|(job_id, _)| *job_id)
            .collect();

        for job_id in due {
            self.spawn_job(job_id);
        }
    }

    fn spawn_job(&mut self, job_id: &'static str) {
        let Some(job) = self.jobs.get(job_id).map(Arc::clone) else {
            error!("Attempted to spawn unknown job: {}", job_id);
            return;
        };

        self.next_runs.remove(job_id);
        info!("Starting job: {}", job_id);

        let ctx = self.job_context.child();
        let completion_sender = self.completion_sender.clone();

        // Jobs are synchronous, so they run on the blocking pool.
        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            match result {
                Ok(Ok(())) => {
                    info!("Job {} completed successfully in {:?}", job_id, elapsed);
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id, elapsed);
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id, elapsed, e);
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id, elapsed, e);
                }
            }

            let _ = completion_sender.send(job_id);
        });

        self.running_handles.insert(job_id, handle);
    }

    fn on_job_finished(&mut self, job_id: &'static str) {
        self.running_handles.remove(job_id);
        if let Some(job) = self.jobs.get(job_id) {
            self.next_runs.insert(job_id, Instant::now() + job.interval());
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");
        for (job_id, handle) in self.running_handles.drain() {
            debug!("Waiting for job {} to stop", job_id);
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }
        info!("Scheduler shutdown complete");
    }
}
