//! Scheduler-dialect rendering of native job specifications.
//!
//! Each supported scheduler has an options struct that knows how to turn
//! itself, plus the worker it describes, into the text passed to the
//! scheduler as `drmaa_native_specification`.

mod gridengine;
mod htcondor;

pub use gridengine::GridEngineOptions;
pub use htcondor::{HtCondorOptions, MIN_MISSING_TIMEOUT, fixed_directives, liveness_expression};

use serde::{Deserialize, Serialize};

use crate::descriptor::WorkerDescriptor;

/// Supported scheduler families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// Queue-based Grid Engine (SGE, OGE, UGE).
    GridEngine,
    /// Slot-pool HTCondor.
    HtCondor,
}

impl std::fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerKind::GridEngine => write!(f, "gridengine"),
            SchedulerKind::HtCondor => write!(f, "htcondor"),
        }
    }
}

/// Renders the native specification for one scheduler dialect.
pub trait NativeSpecStrategy: Send + Sync {
    /// The scheduler family this strategy targets.
    fn kind(&self) -> SchedulerKind;

    /// Produce the native specification for `worker`.
    ///
    /// Called before every submission, so the output may depend on
    /// settings changed since the worker was created.
    fn render(&self, worker: &WorkerDescriptor) -> String;

    /// Reject options that would not render to a well-formed
    /// specification.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_strategies_are_object_safe() {
        let strategies: Vec<Arc<dyn NativeSpecStrategy>> = vec![
            Arc::new(GridEngineOptions::default()),
            Arc::new(HtCondorOptions::default()),
        ];
        let kinds: Vec<_> = strategies.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, [SchedulerKind::GridEngine, SchedulerKind::HtCondor]);
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(SchedulerKind::GridEngine.to_string(), "gridengine");
        let kind: SchedulerKind = serde_yaml_ng::from_str("htcondor").unwrap();
        assert_eq!(kind, SchedulerKind::HtCondor);
    }
}
