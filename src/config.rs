//! Configuration loading via `ortho-config`.
//!
//! Values merge defaults, `vmctl.toml` (or the file named by
//! `VMCTL_CONFIG_PATH`), and `VMCTL_*` environment variables. Command-line
//! flags are applied afterwards through [`TargetOverrides`].

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::compute::ZoneScope;
use crate::gce::DEFAULT_API_BASE;
use crate::wait::WaitPolicy;

/// Zone used when none is configured.
pub const DEFAULT_ZONE: &str = "us-central1-c";

/// Compute Engine settings derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VMCTL",
    discovery(
        app_name = "vmctl",
        env_var = "VMCTL_CONFIG_PATH",
        config_file_name = "vmctl.toml",
        dotfile_name = ".vmctl.toml",
        project_file_name = "vmctl.toml"
    )
)]
pub struct ComputeConfig {
    /// Credentials file; takes precedence over
    /// `GOOGLE_APPLICATION_CREDENTIALS` when set.
    pub credentials_file: Option<String>,
    /// Project that owns the instances. Falls back to the service account's
    /// project when unset.
    pub project_id: Option<String>,
    /// Zone that scopes every call. Defaults to `us-central1-c`.
    #[ortho_config(default = DEFAULT_ZONE.to_owned())]
    pub zone: String,
    /// Base URL of the Compute Engine v1 API.
    #[ortho_config(default = DEFAULT_API_BASE.to_owned())]
    pub api_base: String,
    /// Delay between operation polls, in milliseconds.
    #[ortho_config(default = 2000)]
    pub poll_interval_ms: u64,
    /// Ceiling on the poll delay when backing off, in milliseconds.
    #[ortho_config(default = 2000)]
    pub max_poll_interval_ms: u64,
    /// Multiplier applied to the poll delay after each poll; `1` keeps the
    /// interval fixed.
    #[ortho_config(default = 1)]
    pub poll_backoff_factor: u32,
    /// Upper bound on the wait for a single operation, in seconds.
    #[ortho_config(default = 600)]
    pub wait_timeout_secs: u64,
    /// Optional cap on the number of operation polls.
    pub max_poll_attempts: Option<u32>,
    /// Timeout for each HTTP request, in seconds.
    #[ortho_config(default = 30)]
    pub request_timeout_secs: u64,
}

/// Values supplied on the command line that replace configured ones.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TargetOverrides {
    /// Replacement project identifier.
    pub project_id: Option<String>,
    /// Replacement zone.
    pub zone: Option<String>,
    /// Replacement wait timeout, in seconds.
    pub wait_timeout_secs: Option<u64>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to vmctl.toml",
            self.description, self.env_var, self.toml_key
        ))
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::Invalid(format!(
            "{} {reason}: check {} or {} in vmctl.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const PROJECT_FIELD: FieldMetadata =
    FieldMetadata::new("Compute Engine project", "VMCTL_PROJECT_ID", "project_id");
const ZONE_FIELD: FieldMetadata = FieldMetadata::new("zone", "VMCTL_ZONE", "zone");
const API_BASE_FIELD: FieldMetadata =
    FieldMetadata::new("API base URL", "VMCTL_API_BASE", "api_base");
const CREDENTIALS_FIELD: FieldMetadata = FieldMetadata::new(
    "credentials file",
    "VMCTL_CREDENTIALS_FILE",
    "credentials_file",
);
const POLL_INTERVAL_FIELD: FieldMetadata = FieldMetadata::new(
    "poll interval",
    "VMCTL_POLL_INTERVAL_MS",
    "poll_interval_ms",
);
const BACKOFF_FIELD: FieldMetadata = FieldMetadata::new(
    "poll backoff factor",
    "VMCTL_POLL_BACKOFF_FACTOR",
    "poll_backoff_factor",
);
const WAIT_TIMEOUT_FIELD: FieldMetadata = FieldMetadata::new(
    "wait timeout",
    "VMCTL_WAIT_TIMEOUT_SECS",
    "wait_timeout_secs",
);
const ATTEMPTS_FIELD: FieldMetadata = FieldMetadata::new(
    "poll attempt limit",
    "VMCTL_MAX_POLL_ATTEMPTS",
    "max_poll_attempts",
);
const REQUEST_TIMEOUT_FIELD: FieldMetadata = FieldMetadata::new(
    "request timeout",
    "VMCTL_REQUEST_TIMEOUT_SECS",
    "request_timeout_secs",
);

impl ComputeConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("vmctl")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Replaces configured values with any set in `overrides`.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &TargetOverrides) -> Self {
        if let Some(project_id) = &overrides.project_id {
            self.project_id = Some(project_id.clone());
        }
        if let Some(zone) = &overrides.zone {
            self.zone.clone_from(zone);
        }
        if let Some(timeout) = overrides.wait_timeout_secs {
            self.wait_timeout_secs = timeout;
        }
        self
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide the value via environment variables or configuration
    /// files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is blank
    /// and [`ConfigError::Invalid`] when a numeric knob is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_value(&self.zone, &ZONE_FIELD)?;
        require_value(&self.api_base, &API_BASE_FIELD)?;
        require_optional_value(self.project_id.as_deref(), &PROJECT_FIELD)?;
        require_optional_value(self.credentials_file.as_deref(), &CREDENTIALS_FIELD)?;
        require_positive(self.poll_interval_ms, &POLL_INTERVAL_FIELD)?;
        require_positive(u64::from(self.poll_backoff_factor), &BACKOFF_FIELD)?;
        require_positive(self.wait_timeout_secs, &WAIT_TIMEOUT_FIELD)?;
        require_positive(self.request_timeout_secs, &REQUEST_TIMEOUT_FIELD)?;
        if let Some(attempts) = self.max_poll_attempts {
            require_positive(u64::from(attempts), &ATTEMPTS_FIELD)?;
        }
        Ok(())
    }

    /// Resolves the zone scope, using `fallback_project` (typically the
    /// service account's project) when no project is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no project is available and
    /// [`ConfigError::Invalid`] when the project or zone is malformed.
    pub fn scope(&self, fallback_project: Option<&str>) -> Result<ZoneScope, ConfigError> {
        let project = self
            .project_id
            .as_deref()
            .or(fallback_project)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| PROJECT_FIELD.missing())?;
        ZoneScope::new(project, &self.zone).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Builds the operation wait policy from the polling knobs.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        let policy = WaitPolicy::default()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_backoff(
                self.poll_backoff_factor,
                Duration::from_millis(self.max_poll_interval_ms),
            )
            .with_timeout(Duration::from_secs(self.wait_timeout_secs));
        match self.max_poll_attempts {
            Some(attempts) => policy.with_max_attempts(attempts),
            None => policy,
        }
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn require_value(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

fn require_optional_value(value: Option<&str>, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    match value {
        None => Ok(()),
        Some(v) if !v.trim().is_empty() => Ok(()),
        Some(_) => Err(metadata.invalid("must not be blank when set")),
    }
}

fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(metadata.invalid("must be greater than zero"));
    }
    Ok(())
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
