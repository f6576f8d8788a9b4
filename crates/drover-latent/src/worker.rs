//! The latent worker lifecycle.
//!
//! ```text
//!            start()                      stop()
//!   Idle ──→ Submitting ──→ Running ──→ Terminating ──→ Idle
//!              │ error                       │ any outcome
//!              └──────────→ Idle ←───────────┘
//! ```
//!
//! `start` and `stop` take `&mut self`, so at most one lifecycle call is
//! in flight per worker. The scheduler round trip runs on tokio's blocking
//! pool; the caller only awaits it.
//!
//! A submission outlives a `start` future dropped mid-call (for example by
//! `tokio::time::timeout`). The worker stays `Submitting` and keeps the
//! pending submission: the next `start` resumes it, the next `stop`
//! terminates whatever job it produced, and dropping the worker terminates
//! it in the background.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drover_drm::{DrmError, DrmResult, JobControlAction, JobId, SchedulerSession};
use tokio::task::JoinHandle;

use crate::builder::JobDescriptionBuilder;
use crate::config::DroverConfig;
use crate::descriptor::WorkerDescriptor;
use crate::error::{LatentError, LatentResult};
use crate::strategy::{NativeSpecStrategy, SchedulerKind};

/// Lifecycle state of a [`LatentWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// No job outstanding.
    Idle,
    /// Submission in flight.
    Submitting,
    /// Job submitted; its identifier is held.
    Running,
    /// Termination in flight.
    Terminating,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Submitting => write!(f, "submitting"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Terminating => write!(f, "terminating"),
        }
    }
}

/// A worker that exists only while a scheduler job runs it.
pub struct LatentWorker {
    session: Arc<SchedulerSession>,
    descriptor: WorkerDescriptor,
    builder: JobDescriptionBuilder,
    strategy: Arc<dyn NativeSpecStrategy>,
    state: WorkerState,
    job_id: Option<JobId>,
    submitted_at: Option<DateTime<Utc>>,
    pending: Option<JoinHandle<DrmResult<JobId>>>,
}

impl LatentWorker {
    /// Create an idle worker.
    ///
    /// Opens the shared session if it is not open yet. This blocks on the
    /// scheduler; call it before entering latency-sensitive code.
    pub fn new(
        session: Arc<SchedulerSession>,
        strategy: Arc<dyn NativeSpecStrategy>,
        descriptor: WorkerDescriptor,
        start_command: impl Into<String>,
    ) -> LatentResult<Self> {
        strategy.validate().map_err(LatentError::Configuration)?;
        let builder = JobDescriptionBuilder::new(&session, start_command)?;

        tracing::debug!(
            worker = descriptor.name(),
            scheduler = %strategy.kind(),
            "created latent worker"
        );

        Ok(Self {
            session,
            descriptor,
            builder,
            strategy,
            state: WorkerState::Idle,
            job_id: None,
            submitted_at: None,
            pending: None,
        })
    }

    /// Create an idle worker from a loaded configuration.
    pub fn from_config(
        session: Arc<SchedulerSession>,
        config: &DroverConfig,
    ) -> LatentResult<Self> {
        Self::new(
            session,
            config.strategy(),
            config.descriptor()?,
            config.worker.start_command.clone(),
        )
    }

    /// Submit the worker job.
    ///
    /// Only valid while idle, or while a submission interrupted by a
    /// dropped `start` is still pending, in which case that submission is
    /// awaited instead of sending a new one. On failure the worker is idle
    /// with no job recorded, so the call can be retried.
    pub async fn start(&mut self) -> LatentResult<JobId> {
        if self.pending.is_some() {
            tracing::info!(
                worker = self.descriptor.name(),
                "resuming interrupted submission"
            );
        } else {
            if self.state != WorkerState::Idle {
                return Err(LatentError::InvalidState {
                    expected: WorkerState::Idle.to_string(),
                    found: self.state.to_string(),
                });
            }

            let template = self.builder.build(self.strategy.as_ref(), &self.descriptor);
            let session = Arc::clone(&self.session);
            self.pending = Some(tokio::task::spawn_blocking(move || session.run_job(&template)));
            self.state = WorkerState::Submitting;
        }

        let job_id = self.finish_submission().await?;

        let contact = self.session.contact().unwrap_or_default();
        tracing::info!(
            worker = self.descriptor.name(),
            job_id = %job_id,
            contact = %contact,
            scheduler = %self.strategy.kind(),
            "latent worker queued"
        );

        Ok(job_id)
    }

    /// Await the pending submission and record its outcome.
    ///
    /// Cancel safe: dropped before the submission returns, the handle stays
    /// in `pending` and the worker stays `Submitting`.
    async fn finish_submission(&mut self) -> LatentResult<JobId> {
        let Some(handle) = self.pending.as_mut() else {
            return Err(LatentError::InvalidState {
                expected: WorkerState::Submitting.to_string(),
                found: self.state.to_string(),
            });
        };
        let joined = handle.await;
        self.pending = None;

        let error = match joined {
            Ok(Ok(job_id)) => {
                self.state = WorkerState::Running;
                self.job_id = Some(job_id.clone());
                self.submitted_at = Some(Utc::now());
                return Ok(job_id);
            }
            Ok(Err(DrmError::Configuration(message))) => LatentError::Configuration(message),
            Ok(Err(DrmError::SessionUnavailable(message))) => {
                LatentError::SessionUnavailable(message)
            }
            Ok(Err(other)) => LatentError::SubmissionFailed(other.to_string()),
            Err(e) => LatentError::SubmissionFailed(format!("submission task failed: {e}")),
        };

        self.state = WorkerState::Idle;
        self.job_id = None;
        tracing::error!(
            worker = self.descriptor.name(),
            "failed to submit latent worker: {error}"
        );
        Err(error)
    }

    /// Terminate the worker job.
    ///
    /// Succeeds immediately when no job is outstanding. A job the scheduler
    /// no longer knows counts as stopped. Any other failure is returned as
    /// [`LatentError::TerminationFailed`]; the worker is idle afterwards in
    /// every case. `fast` is recorded but does not change the request.
    pub async fn stop(&mut self, fast: bool) -> LatentResult<()> {
        if self.pending.is_some() {
            tracing::info!(
                worker = self.descriptor.name(),
                "waiting for interrupted submission before stopping"
            );
            if self.finish_submission().await.is_err() {
                return Ok(());
            }
        }

        let Some(job_id) = self.job_id.clone() else {
            tracing::debug!(worker = self.descriptor.name(), "no job to stop");
            self.state = WorkerState::Idle;
            return Ok(());
        };

        tracing::info!(
            worker = self.descriptor.name(),
            job_id = %job_id,
            fast,
            "stopping latent worker"
        );

        let mut transition =
            Transition::begin(&mut self.state, &mut self.job_id, WorkerState::Terminating);

        let session = Arc::clone(&self.session);
        let target = job_id.clone();
        let result = tokio::task::spawn_blocking(move || {
            session.control(&target, JobControlAction::Terminate)
        })
        .await;

        transition.settle(WorkerState::Idle, None);
        self.submitted_at = None;

        let error = match result {
            Ok(Ok(())) => {
                tracing::info!(
                    worker = self.descriptor.name(),
                    job_id = %job_id,
                    "latent worker stopped"
                );
                return Ok(());
            }
            Ok(Err(e)) if e.is_invalid_job() => {
                tracing::info!(
                    worker = self.descriptor.name(),
                    job_id = %job_id,
                    "job no longer valid, treating as stopped"
                );
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };

        tracing::error!(
            worker = self.descriptor.name(),
            job_id = %job_id,
            "failed to terminate latent worker: {error}"
        );
        Err(LatentError::TerminationFailed {
            job_id: job_id.to_string(),
            message: error,
        })
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Identifier of the outstanding job, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    /// When the outstanding job was submitted.
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn descriptor(&self) -> &WorkerDescriptor {
        &self.descriptor
    }

    pub fn scheduler_kind(&self) -> SchedulerKind {
        self.strategy.kind()
    }

    pub fn session(&self) -> &Arc<SchedulerSession> {
        &self.session
    }

    /// The native specification the next `start` would submit.
    pub fn native_specification(&self) -> String {
        self.strategy.render(&self.descriptor)
    }

    /// Change the missing timeout used from the next `start` on.
    pub fn set_missing_timeout(&mut self, timeout: Duration) {
        self.descriptor.set_missing_timeout(timeout);
    }

    /// Replace the scheduler options used from the next `start` on.
    pub fn set_strategy(&mut self, strategy: Arc<dyn NativeSpecStrategy>) -> LatentResult<()> {
        strategy.validate().map_err(LatentError::Configuration)?;
        self.strategy = strategy;
        Ok(())
    }
}

impl Drop for LatentWorker {
    fn drop(&mut self) {
        let Some(handle) = self.pending.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                worker = self.descriptor.name(),
                "dropped with a submission pending outside a runtime; job may be left queued"
            );
            return;
        };

        let session = Arc::clone(&self.session);
        let worker = self.descriptor.name().to_string();
        runtime.spawn(async move {
            let Ok(Ok(job_id)) = handle.await else {
                return;
            };
            let target = job_id.clone();
            let result = tokio::task::spawn_blocking(move || {
                session.control(&target, JobControlAction::Terminate)
            })
            .await;
            match result {
                Ok(Ok(())) => tracing::info!(
                    worker = worker.as_str(),
                    job_id = %job_id,
                    "terminated orphaned submission"
                ),
                Ok(Err(e)) if e.is_invalid_job() => {}
                Ok(Err(e)) => tracing::error!(
                    worker = worker.as_str(),
                    job_id = %job_id,
                    "failed to terminate orphaned submission: {e}"
                ),
                Err(e) => tracing::error!(
                    worker = worker.as_str(),
                    job_id = %job_id,
                    "failed to terminate orphaned submission: {e}"
                ),
            }
        });
    }
}

impl fmt::Debug for LatentWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatentWorker")
            .field("name", &self.descriptor.name())
            .field("scheduler", &self.strategy.kind())
            .field("state", &self.state)
            .field("job_id", &self.job_id)
            .field("submission_pending", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}

/// Holds a worker mid-termination.
///
/// Dropped without [`settle`](Self::settle), e.g. when the owning future is
/// cancelled, it puts the worker back to idle with no job recorded. The
/// terminate request itself has already been handed to the blocking pool.
struct Transition<'a> {
    state: &'a mut WorkerState,
    job_id: &'a mut Option<JobId>,
    settled: bool,
}

impl<'a> Transition<'a> {
    fn begin(state: &'a mut WorkerState, job_id: &'a mut Option<JobId>, to: WorkerState) -> Self {
        *state = to;
        Self {
            state,
            job_id,
            settled: false,
        }
    }

    fn settle(&mut self, state: WorkerState, job_id: Option<JobId>) {
        *self.state = state;
        *self.job_id = job_id;
        self.settled = true;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *self.state = WorkerState::Idle;
            *self.job_id = None;
        }
    }
}
