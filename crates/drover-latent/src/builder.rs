//! Job template assembly.

use drover_drm::{JobTemplate, SchedulerSession};

use crate::descriptor::WorkerDescriptor;
use crate::error::LatentResult;
use crate::strategy::NativeSpecStrategy;

/// Owns one worker's job template.
///
/// The remote command is fixed when the builder is created; the native
/// specification is re-rendered on every [`build`](Self::build).
#[derive(Debug)]
pub struct JobDescriptionBuilder {
    template: JobTemplate,
}

impl JobDescriptionBuilder {
    /// Obtain a blank template from `session` and bind `remote_command`.
    ///
    /// Opens the session on first use, so a missing or broken scheduler
    /// client is reported here.
    pub fn new(
        session: &SchedulerSession,
        remote_command: impl Into<String>,
    ) -> LatentResult<Self> {
        let mut template = session.new_job_template()?;
        template.remote_command = remote_command.into();
        Ok(Self { template })
    }

    /// Render the native specification for `worker` and return the
    /// template ready for submission.
    pub fn build(
        &mut self,
        strategy: &dyn NativeSpecStrategy,
        worker: &WorkerDescriptor,
    ) -> JobTemplate {
        self.template.native_specification = strategy.render(worker);
        self.template.clone()
    }

    pub fn remote_command(&self) -> &str {
        &self.template.remote_command
    }

    /// The template as last built.
    pub fn template(&self) -> &JobTemplate {
        &self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LatentError;
    use crate::strategy::{GridEngineOptions, HtCondorOptions};
    use drover_drm::MockDrm;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_build_rerenders() {
        let session = SchedulerSession::new(Arc::new(MockDrm::new()));
        let mut builder = JobDescriptionBuilder::new(&session, "/opt/worker/start").unwrap();
        assert_eq!(builder.remote_command(), "/opt/worker/start");
        assert!(builder.template().native_specification.is_empty());

        let mut worker = WorkerDescriptor::with_password("w1", "pw").unwrap();
        let first = builder.build(&HtCondorOptions::default(), &worker);
        assert!(first.native_specification.contains("> 1200)"));

        worker.set_missing_timeout(Duration::from_secs(300));
        let second = builder.build(&HtCondorOptions::default(), &worker);
        assert!(second.native_specification.contains("> 300)"));
        assert_eq!(second.remote_command, "/opt/worker/start");

        let third = builder.build(&GridEngineOptions::default(), &worker);
        assert_eq!(third.native_specification, "-q all.q -N LatentWorker -l arch=*");
    }

    #[test]
    fn test_unavailable_client_fails_at_construction() {
        let session = SchedulerSession::new(Arc::new(MockDrm::unavailable("no libdrmaa")));
        let err = JobDescriptionBuilder::new(&session, "/opt/worker/start").unwrap_err();
        assert!(matches!(err, LatentError::Configuration(_)));
    }
}
