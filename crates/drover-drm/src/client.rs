//! Scheduler client traits.
//!
//! A [`DrmClient`] opens connections to an external batch scheduler; a
//! [`DrmConnection`] submits and controls jobs over one such connection.
//!
//! ```text
//!   connect() ──→ create_job_template() ──→ run_job() ──→ control(Terminate)
//!   (client)        (connection)             (connection)   (connection)
//! ```
//!
//! | Method | Blocking | Returns |
//! |--------|----------|---------|
//! | `DrmClient::connect()` | yes | `DrmResult<Arc<dyn DrmConnection>>` |
//! | `DrmConnection::contact()` | no | `&str` |
//! | `DrmConnection::create_job_template()` | no | `DrmResult<JobTemplate>` |
//! | `DrmConnection::run_job()` | yes | `DrmResult<JobId>` |
//! | `DrmConnection::control()` | yes | `DrmResult<()>` |
//!
//! Every blocking method may perform a network or IPC round trip to the
//! scheduler. Async callers must run them on a blocking thread pool
//! (`tokio::task::spawn_blocking`), never on a runtime worker.

use std::sync::Arc;

use crate::error::DrmResult;
use crate::job::{JobControlAction, JobId, JobTemplate};

/// Entry point to a scheduler client implementation.
pub trait DrmClient: Send + Sync {
    /// Short name of this client, used in log messages.
    fn name(&self) -> &str;

    /// Open a connection to the scheduler.
    ///
    /// With `Some(contact)` the connection reattaches to a previously
    /// opened session; with `None` a fresh session is created and its
    /// contact string is available from [`DrmConnection::contact`].
    fn connect(&self, contact: Option<&str>) -> DrmResult<Arc<dyn DrmConnection>>;
}

/// A live connection to the scheduler.
///
/// Implementations must be safe to call concurrently from several threads.
pub trait DrmConnection: Send + Sync {
    /// The contact string that identifies this session.
    fn contact(&self) -> &str;

    /// Create a blank job template bound to this connection.
    fn create_job_template(&self) -> DrmResult<JobTemplate> {
        Ok(JobTemplate::default())
    }

    /// Submit a job and return its scheduler-assigned identifier.
    fn run_job(&self, template: &JobTemplate) -> DrmResult<JobId>;

    /// Apply a control action to a submitted job.
    ///
    /// Returns [`DrmError::InvalidJob`](crate::DrmError::InvalidJob) when the
    /// scheduler no longer knows the identifier.
    fn control(&self, job_id: &JobId, action: JobControlAction) -> DrmResult<()>;
}
