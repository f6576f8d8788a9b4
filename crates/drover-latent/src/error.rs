//! Error handling for latent worker provisioning.

use drover_drm::DrmError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for provisioning operations.
pub type LatentResult<T> = Result<T, LatentError>;

/// Errors that can occur while provisioning or releasing a worker.
#[derive(Error, Debug)]
pub enum LatentError {
    /// The scheduler client is missing or misconfigured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The shared scheduler session could not be opened.
    #[error("Scheduler session unavailable: {0}")]
    SessionUnavailable(String),

    /// The scheduler rejected or failed to accept the job.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// The scheduler no longer recognizes the job identifier.
    #[error("Invalid job reference: {0}")]
    InvalidJobReference(String),

    /// Terminating the job failed for a reason other than an unknown id.
    #[error("Failed to terminate job {job_id}: {message}")]
    TerminationFailed { job_id: String, message: String },

    /// The worker is not in a state that allows the operation.
    #[error("Invalid worker state: expected {expected}, found {found}")]
    InvalidState { expected: String, found: String },

    /// The worker name cannot be used in scheduler directives.
    #[error("Invalid worker name {name:?}: {reason}")]
    InvalidWorkerName { name: String, reason: String },
}

impl From<DrmError> for LatentError {
    fn from(err: DrmError) -> Self {
        match err {
            DrmError::Configuration(msg) => LatentError::Configuration(msg),
            DrmError::SessionUnavailable(msg) => LatentError::SessionUnavailable(msg),
            DrmError::InvalidJob(id) => LatentError::InvalidJobReference(id),
            other => LatentError::SubmissionFailed(other.to_string()),
        }
    }
}

impl From<ConfigError> for LatentError {
    fn from(err: ConfigError) -> Self {
        LatentError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_drm_error() {
        let err: LatentError = DrmError::Configuration("no libdrmaa".into()).into();
        assert!(matches!(err, LatentError::Configuration(_)));

        let err: LatentError = DrmError::SessionUnavailable("init failed".into()).into();
        assert!(matches!(err, LatentError::SessionUnavailable(_)));

        let err: LatentError = DrmError::InvalidJob("1001".into()).into();
        assert!(matches!(err, LatentError::InvalidJobReference(ref id) if id == "1001"));

        let err: LatentError = DrmError::Drm {
            code: 17,
            message: "denied".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Submission failed: Scheduler error 17: denied"
        );
    }

    #[test]
    fn test_error_display() {
        let err = LatentError::InvalidState {
            expected: "idle".into(),
            found: "running".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid worker state: expected idle, found running"
        );

        let err = LatentError::TerminationFailed {
            job_id: "1000".into(),
            message: "communication failure".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to terminate job 1000: communication failure"
        );
    }

    #[test]
    fn test_from_config_error() {
        let err: LatentError = ConfigError::Validation("missing worker name".into()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Validation error: missing worker name"
        );
    }
}
