//! # drover-latent
//!
//! On-demand workers provisioned through a batch scheduler.
//!
//! A [`LatentWorker`] submits a job that starts the worker process on some
//! execution node, and terminates that job when the worker is no longer
//! needed. Scheduler-specific directives come from a
//! [`NativeSpecStrategy`]: [`GridEngineOptions`] for queue-based Grid
//! Engine, [`HtCondorOptions`] for HTCondor pools.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use drover_drm::{MockDrm, SchedulerSession};
//! use drover_latent::{HtCondorOptions, LatentWorker, WorkerDescriptor};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> drover_latent::LatentResult<()> {
//! let session = Arc::new(SchedulerSession::new(Arc::new(MockDrm::new())));
//!
//! let mut worker = LatentWorker::new(
//!     session,
//!     Arc::new(HtCondorOptions::default().accounting_group("group_ci")),
//!     WorkerDescriptor::new("ci-worker-1")?,
//!     "/opt/worker/bin/start-worker",
//! )?;
//!
//! let job_id = worker.start().await?;
//! println!("worker queued as job {job_id}");
//!
//! worker.stop(false).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod secret;
pub mod strategy;
pub mod tracing_config;
pub mod worker;

pub use builder::JobDescriptionBuilder;
pub use config::{ConfigError, DroverConfig, VariantConfig};
pub use descriptor::{DEFAULT_MISSING_TIMEOUT, WorkerDescriptor};
pub use error::{LatentError, LatentResult};
pub use strategy::{GridEngineOptions, HtCondorOptions, NativeSpecStrategy, SchedulerKind};
pub use worker::{LatentWorker, WorkerState};
