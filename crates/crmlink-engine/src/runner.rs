//! Retrying task runner for background sync jobs.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::engine::SyncEngine;
use crate::error::{SyncEngineResult, SyncError};
use crate::job::{JobParams, SyncJob};
use crate::repository::JobRepository;

/// Drives a sync job through the repository with bounded retries.
///
/// Each attempt re-runs the whole `sync()`; the store upsert makes
/// repeated attempts idempotent. After the attempt budget is exhausted
/// the job is marked `Failed` and the last error is returned.
#[derive(Debug, Clone, Copy)]
pub struct TaskRunner {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
        }
    }
}

impl TaskRunner {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Linear backoff: the wait after attempt `n` (1-based) is
    /// `base_delay * n`, so successive waits strictly increase.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Create, persist and run a job for `params`, retrying on
    /// orchestration errors. Returns the job in its terminal state, or
    /// the last error once the job has been marked `Failed`.
    #[instrument(skip(self, engine, repository, params), fields(source = %params.source))]
    pub async fn run_sync(
        &self,
        engine: &SyncEngine,
        repository: &dyn JobRepository,
        params: JobParams,
    ) -> SyncEngineResult<SyncJob> {
        let job = repository.create(SyncJob::new(params)).await?;
        self.run_job(engine, repository, job.id).await
    }

    /// Run an already persisted job to a terminal state.
    pub async fn run_job(
        &self,
        engine: &SyncEngine,
        repository: &dyn JobRepository,
        id: uuid::Uuid,
    ) -> SyncEngineResult<SyncJob> {
        let mut last_error: Option<SyncError> = None;

        for attempt in 1..=self.max_attempts {
            let job = repository.mark_running(id).await?;
            match engine.sync(&job.params).await {
                Ok(report) => {
                    info!(job_id = %id, attempt, success = report.success, "job finished");
                    return repository.complete(id, report).await;
                }
                Err(err) => {
                    warn!(job_id = %id, attempt, error = %err, "sync attempt failed");
                    last_error = Some(err);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.delay_for(attempt)).await;
                    }
                }
            }
        }

        let message = last_error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "sync failed".to_string());
        repository.fail(id, &message).await?;
        Err(last_error.unwrap_or_else(|| SyncError::internal(message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_increase_linearly() {
        let runner = TaskRunner::new(3, Duration::from_secs(60));
        assert_eq!(runner.delay_for(1), Duration::from_secs(60));
        assert_eq!(runner.delay_for(2), Duration::from_secs(120));
        assert!(runner.delay_for(2) > runner.delay_for(1));
        assert!(runner.delay_for(3) > runner.delay_for(2));
    }

    #[test]
    fn attempt_budget_is_at_least_one() {
        assert_eq!(TaskRunner::new(0, Duration::ZERO).max_attempts, 1);
    }
}
