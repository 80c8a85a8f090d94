//! Error taxonomy for the reconciliation core

use std::time::Duration;
use thiserror::Error;

/// A collection contained the same key more than once
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("duplicate key in {side} collection: {key}")]
pub struct DuplicateKeyError {
    /// Which collection was malformed ("desired", "observed", ...)
    pub side: String,

    /// Debug rendering of the offending key
    pub key: String,
}

impl DuplicateKeyError {
    pub fn new(side: impl Into<String>, key: impl std::fmt::Debug) -> Self {
        Self {
            side: side.into(),
            key: format!("{:?}", key),
        }
    }

    /// Re-attribute the error to a named collection
    pub fn in_side(mut self, side: impl Into<String>) -> Self {
        self.side = side.into();
        self
    }
}

/// Self-contradictory field pair in a caller's configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("`{flag_field}` is set to true but `{list_field}` is not empty; set only one of them")]
    MutuallyExclusive {
        flag_field: String,
        list_field: String,
    },

    #[error(
        "`{flag_field}` is set to false but `{list_field}` is empty; nothing would be selected"
    )]
    EmptySelection {
        flag_field: String,
        list_field: String,
    },
}

impl ConstraintError {
    /// The two field identifiers involved in the conflict
    pub fn fields(&self) -> (&str, &str) {
        match self {
            ConstraintError::MutuallyExclusive {
                flag_field,
                list_field,
            }
            | ConstraintError::EmptySelection {
                flag_field,
                list_field,
            } => (flag_field, list_field),
        }
    }
}

/// Ways an awaited asynchronous operation can end without converging
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceError {
    /// The remote system reported a terminal failure status
    #[error("{operation} failed: remote reported status `{status}`")]
    Failed { operation: String, status: String },

    /// No terminal status was observed within the budget
    #[error(
        "{operation} did not converge within {timeout:?} (last status: {})",
        last_status.as_deref().unwrap_or("none")
    )]
    TimedOut {
        operation: String,
        timeout: Duration,
        last_status: Option<String>,
    },

    /// The status probe itself kept failing
    #[error("{operation}: status probe failed {attempts} times in a row: {last_error}")]
    ProbeUnavailable {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// The caller aborted the wait
    #[error("{operation} aborted")]
    Cancelled { operation: String },
}

impl ConvergenceError {
    /// Whether re-running the whole operation (possibly with a larger budget) makes sense
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConvergenceError::TimedOut { .. } | ConvergenceError::ProbeUnavailable { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConvergenceError::Cancelled { .. })
    }
}

/// Errors returned by a Remote Resource API adapter
#[derive(Error, Debug)]
pub enum ApiError {
    /// Create endpoint rejected the request because the object already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unexpected status {code}: {message}")]
    Status { code: u16, message: String },

    /// Connection, timeout or response-decoding failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Umbrella error for callers that drive a full apply
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ConstraintError),

    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKeyError),

    #[error(transparent)]
    Convergence(#[from] ConvergenceError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_error_names_both_fields() {
        let err = ConstraintError::MutuallyExclusive {
            flag_field: "all_spaces".to_string(),
            list_field: "spaces".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("all_spaces"));
        assert!(msg.contains("spaces"));
        assert_eq!(err.fields(), ("all_spaces", "spaces"));
    }

    #[test]
    fn test_convergence_error_retry_classification() {
        let failed = ConvergenceError::Failed {
            operation: "onboard".to_string(),
            status: "Failed".to_string(),
        };
        let timed_out = ConvergenceError::TimedOut {
            operation: "onboard".to_string(),
            timeout: Duration::from_secs(60),
            last_status: Some("Syncing".to_string()),
        };
        let unavailable = ConvergenceError::ProbeUnavailable {
            operation: "onboard".to_string(),
            attempts: 3,
            last_error: "connection refused".to_string(),
        };
        let cancelled = ConvergenceError::Cancelled {
            operation: "onboard".to_string(),
        };

        assert!(!failed.is_retryable());
        assert!(timed_out.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!cancelled.is_retryable());
        assert!(cancelled.is_cancelled());
        assert!(timed_out.to_string().contains("Syncing"));
    }

    #[test]
    fn test_umbrella_error_conversions() {
        let err: Error = DuplicateKeyError::new("desired", "env").into();
        assert!(matches!(err, Error::DuplicateKey(_)));
        assert!(err.to_string().contains("desired"));

        let err: Error = ApiError::AlreadyExists("label env".to_string()).into();
        assert!(err.to_string().starts_with("API error"));
    }
}
