//! Job status polling with backoff and a ceiling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{JobApi, JobStatus};
use crate::config::PollConfig;
use crate::error::PollError;

use super::progress::{ProgressEvent, ProgressReporter};

/// Interval schedule and ceiling for status polling.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_attempts: Option<u32>,
    pub max_duration: Option<Duration>,
}

impl PollPolicy {
    /// Constant interval and no ceiling.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            multiplier: 1.0,
            max_interval: interval,
            max_attempts: None,
            max_duration: None,
        }
    }

    pub fn from_config(config: &PollConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            multiplier: config.multiplier,
            max_interval: Duration::from_millis(config.max_interval_ms),
            max_attempts: config.max_attempts,
            max_duration: config.max_duration_secs.map(Duration::from_secs),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Interval to wait after one that lasted `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.multiplier.max(1.0);
        if !scaled.is_finite() || scaled >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(scaled)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}

/// A job the backend reported as completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    pub task_id: String,
    pub attempts: u32,
    pub message: Option<String>,
}

/// Queries job status until the job completes, fails, or the policy ceiling is hit.
///
/// Each response is handled before the next request is sent.
#[derive(Clone)]
pub struct StatusPoller {
    api: Arc<dyn JobApi>,
    policy: PollPolicy,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn JobApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub async fn poll(
        &self,
        task_id: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<CompletedJob, PollError> {
        let started = Instant::now();
        let deadline = self.policy.max_duration.map(|max| started + max);
        let mut interval = self.policy.initial_interval;
        let mut attempts: u32 = 0;

        loop {
            let attempts_exhausted = self.policy.max_attempts.is_some_and(|max| attempts >= max);
            // No request may go out after the deadline.
            let past_deadline = match deadline {
                Some(deadline) if !attempts_exhausted && Instant::now() + interval > deadline => {
                    tokio::time::sleep_until(deadline).await;
                    true
                }
                _ => false,
            };
            if attempts_exhausted || past_deadline {
                warn!(task_id, attempts, "Giving up on job status");
                return Err(PollError::Timeout {
                    task_id: task_id.to_string(),
                    attempts,
                    elapsed: started.elapsed(),
                });
            }

            tokio::time::sleep(interval).await;
            attempts += 1;

            let response = self.api.job_status(task_id).await.map_err(|e| {
                warn!(task_id, error = %e, "Status query failed");
                PollError::Query {
                    task_id: task_id.to_string(),
                    message: e.to_string(),
                }
            })?;

            let percent = response.progress_percent();
            debug!(task_id, attempts, status = %response.status, percent, "Job status");

            match response.status {
                JobStatus::Completed => {
                    info!(task_id, attempts, "Job completed");
                    progress.report(ProgressEvent::Job {
                        task_id: task_id.to_string(),
                        status: JobStatus::Completed.to_string(),
                        percent: 100,
                        message: Some("Processing complete!".to_string()),
                    });
                    return Ok(CompletedJob {
                        task_id: task_id.to_string(),
                        attempts,
                        message: response.message,
                    });
                }
                JobStatus::Failed => {
                    warn!(task_id, message = ?response.message, "Job failed");
                    return Err(PollError::JobFailed {
                        task_id: task_id.to_string(),
                        message: response.message,
                    });
                }
                status => {
                    progress.report(ProgressEvent::Job {
                        task_id: task_id.to_string(),
                        status: status.to_string(),
                        percent,
                        message: response.message,
                    });
                }
            }

            interval = self.policy.next_interval(interval);
        }
    }

    /// Runs [`poll`](Self::poll) on a background task owned by the returned guard.
    pub fn spawn(&self, task_id: String, progress: Arc<dyn ProgressReporter>) -> PollGuard {
        let poller = self.clone();
        let id = task_id.clone();
        let handle = tokio::spawn(async move { poller.poll(&id, progress.as_ref()).await });
        PollGuard { task_id, handle }
    }
}

/// Owns a spawned polling task. Dropping the guard stops the polling.
pub struct PollGuard {
    task_id: String,
    handle: JoinHandle<Result<CompletedJob, PollError>>,
}

impl PollGuard {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub async fn wait(&mut self) -> Result<CompletedJob, PollError> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(PollError::Cancelled {
                task_id: self.task_id.clone(),
            }),
            Err(e) => Err(PollError::Query {
                task_id: self.task_id.clone(),
                message: e.to_string(),
            }),
        }
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
