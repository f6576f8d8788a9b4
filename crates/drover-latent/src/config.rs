//! Configuration management for latent workers.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with DROVER_ prefix)
//! 3. .env files
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use drover_drm::{DrmaaLibrary, SchedulerSession};
use serde::{Deserialize, Serialize};

use crate::descriptor::WorkerDescriptor;
use crate::error::LatentResult;
use crate::strategy::{GridEngineOptions, HtCondorOptions, NativeSpecStrategy, SchedulerKind};
use crate::tracing_config::{TracingConfig, TracingFormat};

/// Complete latent worker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DroverConfig {
    /// The worker being provisioned
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Scheduler client settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Scheduler dialect and its job options
    #[serde(default)]
    pub variant: VariantConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker identity and timing.
#[derive(Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker name, passed to the worker as its only argument
    #[serde(default)]
    pub name: String,

    /// Worker password; generated when absent (set via DROVER_WORKER_PASSWORD)
    #[serde(default)]
    pub password: Option<String>,

    /// Command started on the execution node
    #[serde(default)]
    pub start_command: String,

    /// Seconds a submitted job may stay unscheduled
    #[serde(default = "default_missing_timeout")]
    pub missing_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            password: None,
            start_command: String::new(),
            missing_timeout_secs: default_missing_timeout(),
        }
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .field("start_command", &self.start_command)
            .field("missing_timeout_secs", &self.missing_timeout_secs)
            .finish()
    }
}

/// Scheduler client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Contact string of a session to reattach to
    #[serde(default)]
    pub contact: Option<String>,

    /// DRMAA library; `$DRMAA_LIBRARY_PATH` or `libdrmaa.so` when unset
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// Serialize calls into a library that is not thread-safe
    #[serde(default)]
    pub serialize_calls: bool,
}

/// Scheduler dialect, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VariantConfig {
    GridEngine(GridEngineOptions),
    HtCondor(HtCondorOptions),
}

impl Default for VariantConfig {
    fn default() -> Self {
        VariantConfig::HtCondor(HtCondorOptions::default())
    }
}

impl VariantConfig {
    pub fn kind(&self) -> SchedulerKind {
        match self {
            VariantConfig::GridEngine(_) => SchedulerKind::GridEngine,
            VariantConfig::HtCondor(_) => SchedulerKind::HtCondor,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "console" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_missing_timeout() -> u64 {
    1200 // 20 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl DroverConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::read(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load .env file if it exists
    /// 2. Load from file if provided
    /// 3. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = match config_file {
            Some(path) => Self::read(path)?,
            None => DroverConfig::default(),
        };

        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::parse(&contents)
    }

    fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Merge `DROVER_*` environment variables into this configuration.
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `var`. Absent variables leave fields unchanged;
    /// unparseable numbers and flags are ignored.
    fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        // Worker
        if let Some(v) = var("DROVER_WORKER_NAME") {
            self.worker.name = v;
        }
        if let Some(v) = var("DROVER_WORKER_PASSWORD") {
            self.worker.password = Some(v);
        }
        if let Some(v) = var("DROVER_START_COMMAND") {
            self.worker.start_command = v;
        }
        if let Some(val) = var("DROVER_MISSING_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.worker.missing_timeout_secs = val;
        }

        // Scheduler
        if let Some(v) = var("DROVER_DRMAA_CONTACT") {
            self.scheduler.contact = Some(v);
        }
        if let Some(v) = var("DROVER_DRMAA_LIBRARY") {
            self.scheduler.library_path = Some(PathBuf::from(v));
        }
        if let Some(val) = var("DROVER_SERIALIZE_CALLS").and_then(|v| parse_flag(&v)) {
            self.scheduler.serialize_calls = val;
        }

        // Logging
        if let Some(v) = var("DROVER_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = var("DROVER_LOG_FORMAT") {
            self.logging.format = v;
        }

        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.name.is_empty() {
            return Err(ConfigError::Validation("worker.name must be set".to_string()));
        }
        if self.worker.start_command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "worker.start_command must be set".to_string(),
            ));
        }
        if self.worker.missing_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "worker.missing_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(password) = &self.worker.password {
            if password.is_empty() {
                return Err(ConfigError::Validation(
                    "worker.password must not be empty; omit it to generate one".to_string(),
                ));
            }
        }
        if let Some(contact) = &self.scheduler.contact {
            if contact.is_empty() {
                return Err(ConfigError::Validation(
                    "scheduler.contact must not be empty".to_string(),
                ));
            }
        }

        if let VariantConfig::GridEngine(options) = &self.variant {
            if options.queue.is_empty() && options.job_name.is_empty() {
                tracing::warn!("gridengine variant has neither queue nor job_name set");
            }
        }
        self.strategy().validate().map_err(ConfigError::Validation)?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "Invalid log level: {other}"
                )));
            }
        }

        match self.logging.format.as_str() {
            "console" | "json" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "Invalid log format: {other}"
                )));
            }
        }

        Ok(())
    }

    /// The native specification strategy for the configured variant.
    pub fn strategy(&self) -> Arc<dyn NativeSpecStrategy> {
        match &self.variant {
            VariantConfig::GridEngine(options) => Arc::new(options.clone()),
            VariantConfig::HtCondor(options) => Arc::new(options.clone()),
        }
    }

    /// The worker descriptor, generating a password if none is configured.
    pub fn descriptor(&self) -> LatentResult<WorkerDescriptor> {
        let descriptor = match &self.worker.password {
            Some(password) => WorkerDescriptor::with_password(&self.worker.name, password)?,
            None => WorkerDescriptor::new(&self.worker.name)?,
        };
        Ok(descriptor.with_missing_timeout(Duration::from_secs(self.worker.missing_timeout_secs)))
    }

    /// The DRMAA client for the configured library.
    pub fn drmaa_library(&self) -> DrmaaLibrary {
        let library = match &self.scheduler.library_path {
            Some(path) => DrmaaLibrary::new(path),
            None => DrmaaLibrary::from_env(),
        };
        library.serialize_calls(self.scheduler.serialize_calls)
    }

    /// A shared session over the configured DRMAA library.
    ///
    /// Nothing is loaded until the first worker is created.
    pub fn open_session(&self) -> Arc<SchedulerSession> {
        let client = Arc::new(self.drmaa_library());
        let session = match &self.scheduler.contact {
            Some(contact) => SchedulerSession::with_contact(client, contact),
            None => SchedulerSession::new(client),
        };
        Arc::new(session)
    }

    /// Tracing settings derived from the logging section.
    pub fn tracing(&self) -> TracingConfig {
        let format = match self.logging.format.as_str() {
            "json" => TracingFormat::Json,
            _ => TracingFormat::Console,
        };
        TracingConfig::new(self.logging.level.clone(), format)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
