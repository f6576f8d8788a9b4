//! The process-wide scheduler session.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::client::{DrmClient, DrmConnection};
use crate::error::{DrmError, DrmResult};
use crate::job::{JobControlAction, JobId, JobTemplate};

/// Shared connection to the scheduler.
///
/// Build one per process and hand it to every worker as
/// `Arc<SchedulerSession>`. The connection is opened lazily on first use;
/// concurrent first callers are serialized so exactly one connection is
/// ever created. There is no explicit close: the connection lives as long
/// as the session does.
pub struct SchedulerSession {
    client: Arc<dyn DrmClient>,
    /// Contact to reattach to when the connection is first opened.
    contact: Option<String>,
    connection: Mutex<Option<Arc<dyn DrmConnection>>>,
}

impl SchedulerSession {
    /// Create a session that opens a fresh scheduler session on first use.
    pub fn new(client: Arc<dyn DrmClient>) -> Self {
        Self {
            client,
            contact: None,
            connection: Mutex::new(None),
        }
    }

    /// Create a session that reattaches to a previously recorded contact.
    pub fn with_contact(client: Arc<dyn DrmClient>, contact: impl Into<String>) -> Self {
        Self {
            client,
            contact: Some(contact.into()),
            connection: Mutex::new(None),
        }
    }

    /// Return the shared connection, opening it if necessary.
    pub fn connection(&self) -> DrmResult<Arc<dyn DrmConnection>> {
        let mut slot = self
            .connection
            .lock()
            .map_err(|_| DrmError::SessionUnavailable("session lock poisoned".into()))?;

        if let Some(connection) = slot.as_ref() {
            return Ok(Arc::clone(connection));
        }

        let connection = match self.client.connect(self.contact.as_deref()) {
            Ok(connection) => connection,
            Err(e @ (DrmError::Configuration(_) | DrmError::SessionUnavailable(_))) => {
                tracing::error!(client = self.client.name(), "cannot open scheduler session: {e}");
                return Err(e);
            }
            Err(e) => {
                tracing::error!(client = self.client.name(), "cannot open scheduler session: {e}");
                return Err(DrmError::SessionUnavailable(e.to_string()));
            }
        };

        if self.contact.is_some() {
            tracing::info!(
                client = self.client.name(),
                contact = connection.contact(),
                "reattached to scheduler session"
            );
        } else {
            tracing::info!(
                client = self.client.name(),
                contact = connection.contact(),
                "opened scheduler session"
            );
        }

        *slot = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// Whether the connection has been opened.
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// The live contact string, or the configured one before connecting.
    pub fn contact(&self) -> Option<String> {
        if let Ok(slot) = self.connection.lock() {
            if let Some(connection) = slot.as_ref() {
                return Some(connection.contact().to_string());
            }
        }
        self.contact.clone()
    }

    /// Name of the underlying client.
    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// A blank job template bound to this session.
    pub fn new_job_template(&self) -> DrmResult<JobTemplate> {
        self.connection()?.create_job_template()
    }

    /// Submit a job over the shared connection.
    pub fn run_job(&self, template: &JobTemplate) -> DrmResult<JobId> {
        self.connection()?.run_job(template)
    }

    /// Control a job over the shared connection.
    pub fn control(&self, job_id: &JobId, action: JobControlAction) -> DrmResult<()> {
        self.connection()?.control(job_id, action)
    }
}

impl fmt::Debug for SchedulerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerSession")
            .field("client", &self.client.name())
            .field("contact", &self.contact())
            .field("connected", &self.is_connected())
            .finish()
    }
}
