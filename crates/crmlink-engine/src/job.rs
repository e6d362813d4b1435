//! Sync job records and their lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crmlink_connector::types::{EntityKind, SyncDirection, SyncSource};

use crate::error::{SyncEngineResult, SyncError};
use crate::report::{RecordError, SyncReport};

/// Lifecycle states of a [`SyncJob`].
///
/// `Completed`, `Partial` and `Failed` are terminal; a terminal job is
/// never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Partial,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Partial | JobStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a sync run should do, fixed at job creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParams {
    pub source: SyncSource,
    pub direction: SyncDirection,
    pub entity_kinds: Vec<EntityKind>,
    /// Walk the full pipeline but skip all writes.
    #[serde(default)]
    pub dry_run: bool,
    /// Incremental-sync watermark; `None` means a full sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_after: Option<DateTime<Utc>>,
}

impl JobParams {
    pub fn new(source: SyncSource, direction: SyncDirection, entity_kinds: Vec<EntityKind>) -> Self {
        Self {
            source,
            direction,
            entity_kinds,
            dry_run: false,
            modified_after: None,
        }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn modified_after(mut self, watermark: DateTime<Utc>) -> Self {
        self.modified_after = Some(watermark);
        self
    }
}

/// One synchronization run, persisted across its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: Uuid,
    pub params: JobParams,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Attempts consumed so far, including the one in flight.
    #[serde(default)]
    pub attempts: u32,
    /// Final run report, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
    /// Orchestration error message, set on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncJob {
    pub fn new(params: JobParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            params,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            attempts: 0,
            report: None,
            error: None,
        }
    }

    fn transition(&mut self, to: JobStatus) -> SyncEngineResult<()> {
        let allowed = match (self.status, to) {
            (JobStatus::Pending, JobStatus::Running) => true,
            (JobStatus::Running, JobStatus::Running) => true,
            (JobStatus::Running, JobStatus::Completed)
            | (JobStatus::Running, JobStatus::Partial)
            | (JobStatus::Running, JobStatus::Failed) => true,
            _ => false,
        };
        if !allowed {
            return Err(SyncError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Move the job to `Running` and count an attempt. Re-entering
    /// `Running` models a retry of a job that never reached a terminal
    /// state.
    pub fn start(&mut self) -> SyncEngineResult<()> {
        self.transition(JobStatus::Running)?;
        self.attempts += 1;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        // A retried attempt clears the previous attempt's error.
        self.error = None;
        Ok(())
    }

    /// Finish the run and freeze the report. `Partial` is chosen when
    /// the run succeeded overall but recorded failures.
    pub fn complete(&mut self, report: SyncReport) -> SyncEngineResult<()> {
        let status = if !report.success {
            JobStatus::Failed
        } else if report.failed > 0 {
            JobStatus::Partial
        } else {
            JobStatus::Completed
        };
        self.transition(status)?;
        self.completed_at = Some(Utc::now());
        self.report = Some(report);
        Ok(())
    }

    /// Mark the job failed with an orchestration-level error. The
    /// report carries a single `exception` descriptor.
    pub fn fail(&mut self, message: impl Into<String>) -> SyncEngineResult<()> {
        self.transition(JobStatus::Failed)?;
        let message = message.into();
        self.completed_at = Some(Utc::now());
        let mut report = SyncReport::default();
        report.errors.push(RecordError::exception(message.clone()));
        self.report = Some(report);
        self.error = Some(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::EntityStats;
    use crmlink_connector::types::EntityKind;

    fn job() -> SyncJob {
        SyncJob::new(JobParams::new(
            SyncSource::DynamicsBc,
            SyncDirection::Inbound,
            vec![EntityKind::Contact],
        ))
    }

    fn clean_report() -> SyncReport {
        let mut report = SyncReport::default();
        report.absorb(
            EntityKind::Contact,
            EntityStats {
                created: 1,
                ..Default::default()
            },
            vec![],
        );
        report.finalize();
        report
    }

    #[test]
    fn fresh_job_is_pending() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert!(job.report.is_none());
    }

    #[test]
    fn start_complete_happy_path() {
        let mut job = job();
        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.attempts, 1);
        job.complete(clean_report()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn success_with_failures_is_partial() {
        let mut job = job();
        job.start().unwrap();
        let mut report = SyncReport::default();
        report.absorb(
            EntityKind::Contact,
            EntityStats {
                created: 2,
                failed: 1,
                ..Default::default()
            },
            vec![RecordError::record(EntityKind::Contact, "c-3", "boom")],
        );
        report.finalize();
        job.complete(report).unwrap();
        assert_eq!(job.status, JobStatus::Partial);
    }

    #[test]
    fn unsuccessful_report_fails_the_job() {
        let mut job = job();
        job.start().unwrap();
        let mut report = SyncReport::default();
        report.absorb(
            EntityKind::Contact,
            EntityStats {
                failed: 3,
                ..Default::default()
            },
            vec![],
        );
        report.finalize();
        job.complete(report).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn fail_records_exception_descriptor() {
        let mut job = job();
        job.start().unwrap();
        job.fail("connector exploded").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let report = job.report.unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].entity, "exception");
        assert_eq!(job.error.as_deref(), Some("connector exploded"));
    }

    #[test]
    fn terminal_jobs_are_frozen() {
        let mut job = job();
        job.start().unwrap();
        job.complete(clean_report()).unwrap();
        assert!(job.start().is_err());
        assert!(job.complete(clean_report()).is_err());
        assert!(job.fail("too late").is_err());
    }

    #[test]
    fn complete_before_start_is_rejected() {
        let mut job = job();
        let err = job.complete(clean_report()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidTransition { .. }));
    }

    #[test]
    fn retry_counts_attempts_and_clears_error() {
        let mut job = job();
        job.start().unwrap();
        job.error = Some("first attempt blew up".to_string());
        job.start().unwrap();
        assert_eq!(job.attempts, 2);
        assert!(job.error.is_none());
    }
}
