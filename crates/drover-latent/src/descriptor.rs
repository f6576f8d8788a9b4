//! Identity and timing of one latent worker.

use std::fmt;
use std::time::Duration;

use crate::error::{LatentError, LatentResult};
use crate::secret::generate_password;

/// Default time a submitted worker may stay unscheduled.
pub const DEFAULT_MISSING_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// What the scheduler needs to know about a worker.
#[derive(Clone, PartialEq, Eq)]
pub struct WorkerDescriptor {
    name: String,
    password: String,
    missing_timeout: Duration,
}

impl WorkerDescriptor {
    /// Describe a worker with a freshly generated password.
    pub fn new(name: impl Into<String>) -> LatentResult<Self> {
        Self::with_password(name, generate_password())
    }

    /// Describe a worker with an operator-supplied password.
    pub fn with_password(
        name: impl Into<String>,
        password: impl Into<String>,
    ) -> LatentResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            password: password.into(),
            missing_timeout: DEFAULT_MISSING_TIMEOUT,
        })
    }

    /// Set how long the job may wait in the queue.
    pub fn with_missing_timeout(mut self, timeout: Duration) -> Self {
        self.missing_timeout = timeout;
        self
    }

    pub fn set_missing_timeout(&mut self, timeout: Duration) {
        self.missing_timeout = timeout;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn missing_timeout(&self) -> Duration {
        self.missing_timeout
    }
}

impl fmt::Debug for WorkerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerDescriptor")
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .field("missing_timeout", &self.missing_timeout)
            .finish()
    }
}

/// Worker names end up inside quoted scheduler attributes and job
/// arguments, so they must be a single printable token.
fn validate_name(name: &str) -> LatentResult<()> {
    let invalid = |reason: &str| LatentError::InvalidWorkerName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(invalid("name contains whitespace"));
    }
    if name.chars().any(|c| c == '"' || c == '\'') {
        return Err(invalid("name contains a quote"));
    }
    if name.chars().any(char::is_control) {
        return Err(invalid("name contains a control character"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let worker = WorkerDescriptor::new("builder-01").unwrap();
        assert_eq!(worker.name(), "builder-01");
        assert_eq!(worker.password().len(), 32);
        assert_eq!(worker.missing_timeout(), Duration::from_secs(1200));
    }

    #[test]
    fn test_supplied_password_and_timeout() {
        let worker = WorkerDescriptor::with_password("builder-01", "hunter2")
            .unwrap()
            .with_missing_timeout(Duration::from_secs(30));
        assert_eq!(worker.password(), "hunter2");
        assert_eq!(worker.missing_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_names() {
        for name in ["", "two words", "quo\"te", "it's", "tab\there", "bell\u{7}"] {
            let err = WorkerDescriptor::new(name).unwrap_err();
            assert!(
                matches!(err, LatentError::InvalidWorkerName { .. }),
                "{name:?} accepted"
            );
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let worker = WorkerDescriptor::with_password("builder-01", "hunter2").unwrap();
        let debug = format!("{worker:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
