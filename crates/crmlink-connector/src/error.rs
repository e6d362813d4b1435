//! Connector error types
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;

use crate::types::SyncSource;

/// Error that can occur during remote-system operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Credentials are missing or the identity provider rejected the exchange.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The remote API returned a non-2xx response.
    #[error("remote API error {status_code}: {body}")]
    RemoteApi { status_code: u16, body: String },

    /// A remote call exceeded its time budget.
    #[error("request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Network-level failure during communication.
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A call was issued before `connect()` or after `close()`.
    #[error("client is not connected")]
    NotConnected,

    /// Client configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// No client implementation is registered for the source.
    #[error("no client registered for source: {source}")]
    UnsupportedSource { source: SyncSource },

    /// A remote record could not be mapped to the CRM shape.
    #[error("mapping failed for field '{field}': {message}")]
    Mapping { field: String, message: String },

    /// The storage collaborator rejected an upsert.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Wire payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ConnectorError {
    /// Check if this error is transient and the operation may be retried.
    ///
    /// Transient errors come from temporary conditions: network failures,
    /// timeouts, throttling, or remote 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::Network { .. } | ConnectorError::Timeout { .. } => true,
            ConnectorError::RemoteApi { status_code, .. } => {
                *status_code == 429 || (500..600).contains(&u32::from(*status_code))
            }
            _ => false,
        }
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::Authentication { .. } => "AUTH_FAILED",
            ConnectorError::RemoteApi { .. } => "REMOTE_API_ERROR",
            ConnectorError::Timeout { .. } => "TIMEOUT",
            ConnectorError::Network { .. } => "NETWORK_ERROR",
            ConnectorError::NotConnected => "NOT_CONNECTED",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::UnsupportedSource { .. } => "UNSUPPORTED_SOURCE",
            ConnectorError::Mapping { .. } => "MAPPING_FAILED",
            ConnectorError::Storage { .. } => "STORAGE_ERROR",
            ConnectorError::Serialization(_) => "SERIALIZATION_ERROR",
            ConnectorError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Convenience constructors

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        ConnectorError::Authentication {
            message: message.into(),
        }
    }

    /// Create a remote API error from a status code and response body.
    pub fn remote_api(status_code: u16, body: impl Into<String>) -> Self {
        ConnectorError::RemoteApi {
            status_code,
            body: body.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        ConnectorError::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a mapping error for a specific field.
    pub fn mapping(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConnectorError::Mapping {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        ConnectorError::Storage {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ConnectorError::Internal {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured timeout; report the
            // classification, callers log the configured budget.
            ConnectorError::Timeout { timeout_secs: 0 }
        } else {
            ConnectorError::network_with_source("request failed", err)
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let transient = vec![
            ConnectorError::network("reset by peer"),
            ConnectorError::Timeout { timeout_secs: 30 },
            ConnectorError::remote_api(503, "unavailable"),
            ConnectorError::remote_api(429, "throttled"),
        ];
        for err in transient {
            assert!(err.is_transient(), "expected {} transient", err.error_code());
        }
    }

    #[test]
    fn permanent_classification() {
        let permanent = vec![
            ConnectorError::authentication("bad secret"),
            ConnectorError::remote_api(404, "not found"),
            ConnectorError::remote_api(400, "bad filter"),
            ConnectorError::invalid_configuration("missing tenant"),
            ConnectorError::mapping("displayName", "missing"),
            ConnectorError::NotConnected,
        ];
        for err in permanent {
            assert!(err.is_permanent(), "expected {} permanent", err.error_code());
        }
    }

    #[test]
    fn error_display() {
        let err = ConnectorError::remote_api(502, "bad gateway");
        assert_eq!(err.to_string(), "remote API error 502: bad gateway");

        let err = ConnectorError::mapping("displayName", "missing required field");
        assert_eq!(
            err.to_string(),
            "mapping failed for field 'displayName': missing required field"
        );
    }
}
