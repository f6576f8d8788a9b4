//! Job identifiers, templates and control actions.

use serde::{Deserialize, Serialize};

/// Scheduler-assigned identifier of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A job description handed to the scheduler on submission.
///
/// `native_specification` is passed through untouched; it is the only way
/// scheduler-specific options reach the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobTemplate {
    /// Command started on the execution node.
    pub remote_command: String,
    /// Scheduler-dialect directives.
    pub native_specification: String,
}

impl JobTemplate {
    /// Whether neither a remote command nor a native specification is set.
    pub fn is_blank(&self) -> bool {
        self.remote_command.is_empty() && self.native_specification.is_empty()
    }
}

/// Control operations on a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobControlAction {
    Suspend,
    Resume,
    Hold,
    Release,
    Terminate,
}

impl JobControlAction {
    /// The DRMAA v1 action code.
    pub fn code(self) -> i32 {
        match self {
            JobControlAction::Suspend => 0,
            JobControlAction::Resume => 1,
            JobControlAction::Hold => 2,
            JobControlAction::Release => 3,
            JobControlAction::Terminate => 4,
        }
    }
}

impl std::fmt::Display for JobControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobControlAction::Suspend => write!(f, "suspend"),
            JobControlAction::Resume => write!(f, "resume"),
            JobControlAction::Hold => write!(f, "hold"),
            JobControlAction::Release => write!(f, "release"),
            JobControlAction::Terminate => write!(f, "terminate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_conversions() {
        let id = JobId::from("1042");
        assert_eq!(id.as_str(), "1042");
        assert_eq!(id.to_string(), "1042");
        assert_eq!(JobId::from("1042".to_string()), id);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1042\"");
    }

    #[test]
    fn test_blank_template() {
        let template = JobTemplate::default();
        assert!(template.is_blank());

        let template = JobTemplate {
            remote_command: "/opt/worker/start".into(),
            ..Default::default()
        };
        assert!(!template.is_blank());

        let template = JobTemplate {
            native_specification: "-q all.q ".into(),
            ..Default::default()
        };
        assert!(!template.is_blank());
    }

    #[test]
    fn test_control_codes() {
        assert_eq!(JobControlAction::Suspend.code(), 0);
        assert_eq!(JobControlAction::Release.code(), 3);
        assert_eq!(JobControlAction::Terminate.code(), 4);
        assert_eq!(JobControlAction::Terminate.to_string(), "terminate");
    }
}
