//! # drover-drm
//!
//! Scheduler session layer for latent worker provisioning.
//!
//! A process opens one [`SchedulerSession`] and shares it between every
//! worker it provisions. The session connects lazily through a
//! [`DrmClient`]: either the vendor DRMAA library loaded at runtime
//! ([`DrmaaLibrary`]) or the in-memory [`MockDrm`] used by tests and demos.
//!
//! ```text
//!   LatentWorker ─┐
//!   LatentWorker ─┼──→ Arc<SchedulerSession> ──→ dyn DrmClient ──→ libdrmaa.so
//!   LatentWorker ─┘        (one connection)        (DrmaaLibrary / MockDrm)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use drover_drm::{JobControlAction, MockDrm, SchedulerSession};
//!
//! let session = SchedulerSession::new(Arc::new(MockDrm::new()));
//!
//! let mut template = session.new_job_template().unwrap();
//! template.remote_command = "/opt/worker/start".into();
//! template.native_specification = "-q all.q".into();
//!
//! let job_id = session.run_job(&template).unwrap();
//! session.control(&job_id, JobControlAction::Terminate).unwrap();
//! ```

pub mod client;
pub mod drmaa;
pub mod error;
pub mod job;
pub mod mock;
pub mod session;

pub use client::{DrmClient, DrmConnection};
pub use drmaa::DrmaaLibrary;
pub use error::{DrmError, DrmResult};
pub use job::{JobControlAction, JobId, JobTemplate};
pub use mock::MockDrm;
pub use session::SchedulerSession;
