//! In-memory scheduler for tests and demos.
//!
//! [`MockDrm`] behaves like a well-mannered batch scheduler: it hands out
//! sequential job ids, remembers which jobs are still active, and reports
//! [`DrmError::InvalidJob`] for jobs it no longer knows. Failures can be
//! queued up front to exercise error paths.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustc_hash::FxHashSet;

use crate::client::{DrmClient, DrmConnection};
use crate::error::{DrmError, DrmResult};
use crate::job::{JobControlAction, JobId, JobTemplate};

#[derive(Default)]
struct MockState {
    connects: AtomicUsize,
    controls: AtomicUsize,
    next_job: AtomicU64,
    connect_delay: Duration,
    submit_delay: Duration,
    unavailable: Option<String>,
    last_contact: Mutex<Option<String>>,
    active: Mutex<FxHashSet<JobId>>,
    submitted: Mutex<Vec<JobTemplate>>,
    submit_failures: Mutex<VecDeque<DrmError>>,
    control_failures: Mutex<VecDeque<DrmError>>,
}

/// Mock scheduler client.
///
/// Clones share state, so a test can keep one handle for inspection while
/// the session owns another.
#[derive(Clone)]
pub struct MockDrm {
    state: Arc<MockState>,
}

impl Default for MockDrm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDrm {
    /// Create a mock scheduler whose job ids start at 1000.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                next_job: AtomicU64::new(1000),
                ..Default::default()
            }),
        }
    }

    /// A mock whose client library cannot be loaded.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: Arc::new(MockState {
                next_job: AtomicU64::new(1000),
                unavailable: Some(reason.into()),
                ..Default::default()
            }),
        }
    }

    /// Delay every `connect` call, to widen race windows in tests.
    ///
    /// Must be called before the mock is cloned or handed out.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        if let Some(state) = Arc::get_mut(&mut self.state) {
            state.connect_delay = delay;
        }
        self
    }

    /// Delay every `run_job` call, to keep a submission in flight.
    ///
    /// Must be called before the mock is cloned or handed out.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        if let Some(state) = Arc::get_mut(&mut self.state) {
            state.submit_delay = delay;
        }
        self
    }

    /// Fail the next submission with `error`.
    pub fn fail_next_submit(&self, error: DrmError) {
        lock(&self.state.submit_failures).push_back(error);
    }

    /// Fail the next control call with `error`.
    pub fn fail_next_control(&self, error: DrmError) {
        lock(&self.state.control_failures).push_back(error);
    }

    /// Drop a job as if it had finished or been reaped by the scheduler.
    pub fn forget_job(&self, job_id: &JobId) -> bool {
        lock(&self.state.active).remove(job_id)
    }

    /// Number of connections opened so far.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of control calls received so far.
    pub fn control_count(&self) -> usize {
        self.state.controls.load(Ordering::SeqCst)
    }

    /// Contact passed to the most recent `connect` call.
    pub fn last_contact_requested(&self) -> Option<String> {
        lock(&self.state.last_contact).clone()
    }

    /// Whether the scheduler still considers the job active.
    pub fn is_active(&self, job_id: &JobId) -> bool {
        lock(&self.state.active).contains(job_id)
    }

    /// Number of active jobs.
    pub fn active_count(&self) -> usize {
        lock(&self.state.active).len()
    }

    /// Every template submitted so far, in submission order.
    pub fn submitted(&self) -> Vec<JobTemplate> {
        lock(&self.state.submitted).clone()
    }
}

impl DrmClient for MockDrm {
    fn name(&self) -> &str {
        "mock"
    }

    fn connect(&self, contact: Option<&str>) -> DrmResult<Arc<dyn DrmConnection>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        *lock(&self.state.last_contact) = contact.map(str::to_string);

        if !self.state.connect_delay.is_zero() {
            std::thread::sleep(self.state.connect_delay);
        }

        if let Some(reason) = &self.state.unavailable {
            return Err(DrmError::Configuration(reason.clone()));
        }

        let contact = contact
            .map(str::to_string)
            .unwrap_or_else(|| format!("mock-{}", uuid::Uuid::new_v4()));

        Ok(Arc::new(MockConnection {
            state: Arc::clone(&self.state),
            contact,
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
    contact: String,
}

impl DrmConnection for MockConnection {
    fn contact(&self) -> &str {
        &self.contact
    }

    fn run_job(&self, template: &JobTemplate) -> DrmResult<JobId> {
        if !self.state.submit_delay.is_zero() {
            std::thread::sleep(self.state.submit_delay);
        }

        if let Some(error) = lock(&self.state.submit_failures).pop_front() {
            return Err(error);
        }

        if template.remote_command.is_empty() {
            return Err(DrmError::InvalidAttribute {
                name: "remote_command".into(),
                message: "no remote command set".into(),
            });
        }

        let job_id = JobId::new(self.state.next_job.fetch_add(1, Ordering::SeqCst).to_string());
        lock(&self.state.active).insert(job_id.clone());
        lock(&self.state.submitted).push(template.clone());
        Ok(job_id)
    }

    fn control(&self, job_id: &JobId, action: JobControlAction) -> DrmResult<()> {
        self.state.controls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = lock(&self.state.control_failures).pop_front() {
            return Err(error);
        }

        let mut active = lock(&self.state.active);
        if !active.contains(job_id) {
            return Err(DrmError::InvalidJob(job_id.to_string()));
        }
        if action == JobControlAction::Terminate {
            active.remove(job_id);
        }
        Ok(())
    }
}

/// Lock a mock mutex, recovering the data if a test thread panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> JobTemplate {
        JobTemplate {
            remote_command: "/opt/worker/start".into(),
            native_specification: "request_cpu=1\n".into(),
        }
    }

    #[test]
    fn test_sequential_job_ids() {
        let drm = MockDrm::new();
        let conn = drm.connect(None).unwrap();

        assert_eq!(conn.run_job(&template()).unwrap(), JobId::new("1000"));
        assert_eq!(conn.run_job(&template()).unwrap(), JobId::new("1001"));
        assert_eq!(drm.active_count(), 2);
        assert_eq!(drm.submitted().len(), 2);
    }

    #[test]
    fn test_terminate_then_invalid() {
        let drm = MockDrm::new();
        let conn = drm.connect(None).unwrap();
        let job_id = conn.run_job(&template()).unwrap();

        conn.control(&job_id, JobControlAction::Terminate).unwrap();
        assert!(!drm.is_active(&job_id));

        let err = conn
            .control(&job_id, JobControlAction::Terminate)
            .unwrap_err();
        assert!(err.is_invalid_job());
        assert_eq!(drm.control_count(), 2);
    }

    #[test]
    fn test_queued_failures() {
        let drm = MockDrm::new();
        let conn = drm.connect(Some("contact-1")).unwrap();
        assert_eq!(conn.contact(), "contact-1");

        drm.fail_next_submit(DrmError::Drm {
            code: 17,
            message: "denied".into(),
        });
        assert!(conn.run_job(&template()).is_err());
        let job_id = conn.run_job(&template()).unwrap();

        drm.fail_next_control(DrmError::Drm {
            code: 2,
            message: "communication failure".into(),
        });
        assert!(matches!(
            conn.control(&job_id, JobControlAction::Terminate),
            Err(DrmError::Drm { code: 2, .. })
        ));
        assert!(drm.is_active(&job_id));
    }

    #[test]
    fn test_rejects_missing_command() {
        let drm = MockDrm::new();
        let conn = drm.connect(None).unwrap();
        let err = conn.run_job(&JobTemplate::default()).unwrap_err();
        assert!(matches!(err, DrmError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_unavailable() {
        let drm = MockDrm::unavailable("no libdrmaa");
        assert!(matches!(
            drm.connect(None),
            Err(DrmError::Configuration(_))
        ));
        assert_eq!(drm.connect_count(), 1);
    }
}
