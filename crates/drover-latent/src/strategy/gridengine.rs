//! Grid Engine (`qsub`-style) native specification.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use super::{NativeSpecStrategy, SchedulerKind};
use crate::descriptor::WorkerDescriptor;

/// Job options for a Grid Engine queue.
///
/// Rendered as `qsub` switches, e.g. `-q all.q -N LatentWorker -l arch=*`.
/// Empty options are left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridEngineOptions {
    /// Queue name (`-q`).
    pub queue: String,
    /// Job display name (`-N`).
    pub job_name: String,
    /// Command shell (`-S`).
    pub shell: Option<String>,
    /// Environment passthrough (`-v`).
    pub env: Option<String>,
    /// Resource requests (`-l name=value,...`).
    pub resources: BTreeMap<String, String>,
}

impl Default for GridEngineOptions {
    fn default() -> Self {
        Self {
            queue: "all.q".to_string(),
            job_name: "LatentWorker".to_string(),
            shell: None,
            env: None,
            resources: BTreeMap::from([("arch".to_string(), "*".to_string())]),
        }
    }
}

impl GridEngineOptions {
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = name.into();
        self
    }

    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Request a resource, replacing any earlier value for `name`.
    pub fn resource(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.resources.insert(name.into(), value.into());
        self
    }

    /// Drop every resource request, including the default `arch=*`.
    pub fn without_resources(mut self) -> Self {
        self.resources.clear();
        self
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("queue", Some(self.queue.as_str())),
            ("job_name", Some(self.job_name.as_str())),
            ("shell", self.shell.as_deref()),
            ("env", self.env.as_deref()),
        ]
    }

    fn switches(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("-q", Some(self.queue.as_str())),
            ("-N", Some(self.job_name.as_str())),
            ("-S", self.shell.as_deref()),
            ("-v", self.env.as_deref()),
        ]
    }
}

impl NativeSpecStrategy for GridEngineOptions {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::GridEngine
    }

    fn render(&self, _worker: &WorkerDescriptor) -> String {
        let mut spec = String::new();

        for (switch, value) in self.switches() {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                let _ = write!(spec, "{switch} {value} ");
            }
        }

        if !self.resources.is_empty() {
            let resources: Vec<String> = self
                .resources
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            let _ = write!(spec, "-l {}", resources.join(","));
        }

        spec
    }

    fn validate(&self) -> Result<(), String> {
        for (field, value) in self.fields() {
            if let Some(value) = value.filter(|v| has_break(v)) {
                return Err(format!(
                    "gridengine {field} must be a single token, got {value:?}"
                ));
            }
        }

        for (name, value) in &self.resources {
            if name.is_empty() || has_break(name) || name.contains([',', '=']) {
                return Err(format!("gridengine resource name {name:?} is not valid"));
            }
            if value.is_empty() || has_break(value) || value.contains(',') {
                return Err(format!(
                    "gridengine resource {name} has invalid value {value:?}"
                ));
            }
        }

        Ok(())
    }
}

/// Characters that would split or corrupt a `qsub` token.
fn has_break(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '\'')
}
