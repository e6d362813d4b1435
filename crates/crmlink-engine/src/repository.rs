//! Persistence seam for sync jobs.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crmlink_connector::types::SyncSource;

use crate::error::{SyncEngineResult, SyncError};
use crate::job::{JobStatus, SyncJob};
use crate::report::SyncReport;

/// Filter for job listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobQuery {
    pub source: Option<SyncSource>,
    pub status: Option<JobStatus>,
    /// Maximum number of jobs to return; `None` means unbounded.
    pub limit: Option<usize>,
}

/// Storage for [`SyncJob`] records.
///
/// Implementations must apply lifecycle mutations through the job's own
/// state machine so that terminal jobs stay frozen.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a freshly created job.
    async fn create(&self, job: SyncJob) -> SyncEngineResult<SyncJob>;

    /// Fetch a job by id.
    async fn get(&self, id: Uuid) -> SyncEngineResult<SyncJob>;

    /// List jobs newest-first, applying the query filters.
    async fn list(&self, query: JobQuery) -> SyncEngineResult<Vec<SyncJob>>;

    /// Transition the job to `Running`, counting an attempt.
    async fn mark_running(&self, id: Uuid) -> SyncEngineResult<SyncJob>;

    /// Finish the job with a run report.
    async fn complete(&self, id: Uuid, report: SyncReport) -> SyncEngineResult<SyncJob>;

    /// Fail the job with an orchestration error message.
    async fn fail(&self, id: Uuid, message: &str) -> SyncEngineResult<SyncJob>;
}

/// Process-local job store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, SyncJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, mutate: F) -> SyncEngineResult<SyncJob>
    where
        F: FnOnce(&mut SyncJob) -> SyncEngineResult<()>,
    {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| SyncError::repository("job store lock poisoned"))?;
        let job = jobs.get_mut(&id).ok_or(SyncError::JobNotFound { id })?;
        mutate(job)?;
        Ok(job.clone())
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: SyncJob) -> SyncEngineResult<SyncJob> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| SyncError::repository("job store lock poisoned"))?;
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> SyncEngineResult<SyncJob> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| SyncError::repository("job store lock poisoned"))?;
        jobs.get(&id)
            .cloned()
            .ok_or(SyncError::JobNotFound { id })
    }

    async fn list(&self, query: JobQuery) -> SyncEngineResult<Vec<SyncJob>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| SyncError::repository("job store lock poisoned"))?;
        let mut matching: Vec<SyncJob> = jobs
            .values()
            .filter(|job| query.source.is_none_or(|s| job.params.source == s))
            .filter(|job| query.status.is_none_or(|s| job.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn mark_running(&self, id: Uuid) -> SyncEngineResult<SyncJob> {
        self.update(id, |job| job.start())
    }

    async fn complete(&self, id: Uuid, report: SyncReport) -> SyncEngineResult<SyncJob> {
        self.update(id, |job| job.complete(report))
    }

    async fn fail(&self, id: Uuid, message: &str) -> SyncEngineResult<SyncJob> {
        self.update(id, |job| job.fail(message))
    }
}
