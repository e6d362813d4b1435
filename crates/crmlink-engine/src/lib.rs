//! Synchronization engine: field mapping, run orchestration, job
//! lifecycle and the retrying task runner.
//!
//! The engine pulls pages from a [`crmlink_connector::RemoteClient`],
//! maps them into CRM payloads and upserts them through the
//! [`storage::CrmStore`] seam; job state is tracked through
//! [`repository::JobRepository`] and driven by [`runner::TaskRunner`].

pub mod engine;
pub mod error;
pub mod job;
pub mod mapper;
pub mod report;
pub mod repository;
pub mod runner;
pub mod storage;

pub use engine::{SyncEngine, SyncOptions};
pub use error::{SyncEngineResult, SyncError};
pub use job::{JobParams, JobStatus, SyncJob};
pub use mapper::{MappingRule, MappingValidation, PreviewRecord};
pub use report::{EntityStats, RecordError, SyncReport};
pub use repository::{InMemoryJobRepository, JobQuery, JobRepository};
pub use runner::TaskRunner;
pub use storage::{CrmStore, InMemoryCrmStore, UpsertOutcome};
