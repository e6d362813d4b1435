//! Engine error types.

use thiserror::Error;
use uuid::Uuid;

use crmlink_connector::error::ConnectorError;
use crmlink_connector::types::SyncSource;

/// Errors raised by the sync engine and job machinery.
///
/// Per-record failures are *not* errors at this level: they aggregate into
/// the job's error list. Only orchestration-level problems surface here.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote client failure that aborted orchestration.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// A job was requested with no entity kinds.
    #[error("at least one entity kind is required")]
    NoEntityKinds,

    /// No client implementation registered for the source.
    #[error("source not supported: {source}")]
    UnsupportedSource { source: SyncSource },

    /// Job lookup failed.
    #[error("job not found: {id}")]
    JobNotFound { id: Uuid },

    /// A state transition the job state machine forbids.
    #[error("invalid job state transition from {from} to {to}")]
    InvalidTransition {
        from: crate::job::JobStatus,
        to: crate::job::JobStatus,
    },

    /// Job repository failure.
    #[error("repository error: {message}")]
    Repository { message: String },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    /// Create a repository error.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for engine operations.
pub type SyncEngineResult<T> = Result<T, SyncError>;
