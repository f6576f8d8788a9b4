//! HTCondor submit-description native specification.
//!
//! The rendered text has three blocks, in this order:
//!
//! 1. overridable `key=value` lines (resource requests, accounting group),
//! 2. caller-supplied extra directives, verbatim,
//! 3. fixed directives the worker lifecycle depends on.
//!
//! HTCondor keeps the last assignment of a key, so the fixed block always
//! wins over anything earlier in the text.

use std::fmt::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{NativeSpecStrategy, SchedulerKind};
use crate::descriptor::WorkerDescriptor;
use crate::secret::escape_env_value;

/// Lowest missing timeout the negotiator can act on.
pub const MIN_MISSING_TIMEOUT: Duration = Duration::from_secs(120);

/// Seconds HTCondor waits after `kill_sig` before hard-killing the worker.
const JOB_MAX_VACATE_TIME: u64 = 60;

/// Job options for an HTCondor pool.
///
/// `None` fields are omitted from the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtCondorOptions {
    /// CPUs per worker.
    pub request_cpu: Option<u32>,
    /// Scratch disk in KiB.
    pub request_disk: Option<u64>,
    /// Memory in MiB.
    pub request_memory: Option<u64>,
    pub accounting_group: Option<String>,
    pub accounting_group_user: Option<String>,
    /// Custom machine resource; renders `request_<name>=1` so execute
    /// nodes can cap how many workers they accept.
    pub slot_resource: Option<String>,
    /// Raw submit-description lines placed before the fixed block.
    pub extra_directives: Option<String>,
}

impl Default for HtCondorOptions {
    fn default() -> Self {
        Self {
            request_cpu: Some(1),
            request_disk: Some(2 * 1024 * 1024),
            request_memory: Some(2048),
            accounting_group: None,
            accounting_group_user: None,
            slot_resource: None,
            extra_directives: None,
        }
    }
}

impl HtCondorOptions {
    pub fn request_cpu(mut self, cpus: u32) -> Self {
        self.request_cpu = Some(cpus);
        self
    }

    pub fn request_disk(mut self, kib: u64) -> Self {
        self.request_disk = Some(kib);
        self
    }

    pub fn request_memory(mut self, mib: u64) -> Self {
        self.request_memory = Some(mib);
        self
    }

    pub fn accounting_group(mut self, group: impl Into<String>) -> Self {
        self.accounting_group = Some(group.into());
        self
    }

    pub fn accounting_group_user(mut self, user: impl Into<String>) -> Self {
        self.accounting_group_user = Some(user.into());
        self
    }

    pub fn slot_resource(mut self, resource: impl Into<String>) -> Self {
        self.slot_resource = Some(resource.into());
        self
    }

    pub fn extra_directives(mut self, directives: impl Into<String>) -> Self {
        self.extra_directives = Some(directives.into());
        self
    }

    fn overridable(&self) -> Vec<(String, String)> {
        let mut lines = Vec::new();
        if let Some(resource) = &self.slot_resource {
            lines.push((format!("request_{resource}"), "1".to_string()));
        }
        if let Some(user) = &self.accounting_group_user {
            lines.push(("accounting_group_user".to_string(), user.clone()));
        }
        if let Some(group) = &self.accounting_group {
            lines.push(("accounting_group".to_string(), group.clone()));
        }
        if let Some(cpus) = self.request_cpu {
            lines.push(("request_cpu".to_string(), cpus.to_string()));
        }
        if let Some(disk) = self.request_disk {
            lines.push(("request_disk".to_string(), disk.to_string()));
        }
        if let Some(memory) = self.request_memory {
            lines.push(("request_memory".to_string(), memory.to_string()));
        }
        lines
    }
}

/// `periodic_remove` expression for a job that should not wait longer than
/// `missing_timeout` to be scheduled.
///
/// Held jobs (status 5) are removed at once; idle jobs (status 1) once
/// they have waited longer than the timeout, floored at
/// [`MIN_MISSING_TIMEOUT`].
pub fn liveness_expression(missing_timeout: Duration) -> String {
    let secs = missing_timeout.max(MIN_MISSING_TIMEOUT).as_secs();
    format!("(JobStatus == 5) || (JobStatus == 1 && (time() - EnteredCurrentStatus) > {secs})")
}

/// The directives appended after everything else.
pub fn fixed_directives(worker: &WorkerDescriptor) -> String {
    let name = worker.name();
    let mut out = String::new();
    let _ = writeln!(out, "+JobMaxVacateTime={JOB_MAX_VACATE_TIME}");
    out.push_str("kill_sig=SIGHUP\n");
    out.push_str("want_graceful_removal=TRUE\n");
    out.push_str("getenv=true\n");
    out.push_str("transfer_executable=true\n");
    let _ = writeln!(
        out,
        "periodic_remove={}",
        liveness_expression(worker.missing_timeout())
    );
    let _ = writeln!(out, "arguments={name}");
    out.push_str("job_ad_information_attrs=WorkerName\n");
    let _ = writeln!(out, "+WorkerName=\"{name}\"");
    let _ = writeln!(out, "+JobDescription=\"{name}\"");
    out.push_str("+LatentWorkerJob=TRUE\n");
    let _ = writeln!(
        out,
        "environment=\"WORKER_PASSWORD={}\"",
        escape_env_value(worker.password())
    );
    out
}

impl NativeSpecStrategy for HtCondorOptions {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::HtCondor
    }

    fn render(&self, worker: &WorkerDescriptor) -> String {
        let mut spec = String::new();

        for (key, value) in self.overridable() {
            let _ = writeln!(spec, "{key}={value}");
        }

        if let Some(extra) = self.extra_directives.as_deref().filter(|e| !e.is_empty()) {
            spec.push_str(extra);
            if !extra.ends_with('\n') {
                spec.push('\n');
            }
        }

        spec.push_str(&fixed_directives(worker));
        spec
    }

    fn validate(&self) -> Result<(), String> {
        if self.request_cpu == Some(0) {
            return Err("htcondor request_cpu must be greater than 0".to_string());
        }
        if self.request_memory == Some(0) {
            return Err("htcondor request_memory must be greater than 0".to_string());
        }
        Ok(())
    }
}
