//! Error handling for the scheduler client layer.

use thiserror::Error;

/// Result type for scheduler client operations.
pub type DrmResult<T> = Result<T, DrmError>;

/// Errors raised by a scheduler client or the shared session.
#[derive(Error, Debug)]
pub enum DrmError {
    /// The scheduler client library is missing or unusable.
    #[error("Scheduler client not configured: {0}")]
    Configuration(String),

    /// A session with the scheduler could not be created or reattached.
    #[error("Scheduler session unavailable: {0}")]
    SessionUnavailable(String),

    /// The scheduler no longer recognizes the job identifier.
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// A template attribute could not be passed to the scheduler.
    #[error("Invalid attribute {name}: {message}")]
    InvalidAttribute { name: String, message: String },

    /// Any other failure reported by the scheduler.
    #[error("Scheduler error {code}: {message}")]
    Drm { code: i32, message: String },

    /// Internal client error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DrmError {
    /// Whether this error means the job is already gone.
    pub fn is_invalid_job(&self) -> bool {
        matches!(self, DrmError::InvalidJob(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DrmError::InvalidJob("1001".to_string());
        assert_eq!(err.to_string(), "Invalid job: 1001");

        let err = DrmError::Drm {
            code: 17,
            message: "denied by DRM".to_string(),
        };
        assert_eq!(err.to_string(), "Scheduler error 17: denied by DRM");

        let err = DrmError::InvalidAttribute {
            name: "drmaa_remote_command".to_string(),
            message: "interior nul byte".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid attribute drmaa_remote_command: interior nul byte"
        );
    }

    #[test]
    fn test_is_invalid_job() {
        assert!(DrmError::InvalidJob("1".into()).is_invalid_job());
        assert!(!DrmError::Internal("boom".into()).is_invalid_job());
    }
}
