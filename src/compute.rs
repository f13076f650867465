//! Provider abstraction for inspecting and transitioning compute instances.
//!
//! The types here describe the small slice of the Compute Engine API that
//! `vmctl` relies on: instance status, zone operations, and the four calls
//! needed to read and mutate them. Implementations live in [`crate::gce`]
//! and, for tests, [`crate::test_support`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Errors raised while building a request target.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TargetError {
    /// Raised when a required identifier is missing or blank.
    #[error("missing or empty field: {0}")]
    Validation(String),
    /// Raised when an identifier would escape its URL path segment.
    #[error("{field} must not contain '/': {value}")]
    InvalidCharacter {
        /// Name of the offending field.
        field: String,
        /// Value supplied by the caller.
        value: String,
    },
}

fn require_segment(field: &str, value: &str) -> Result<String, TargetError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TargetError::Validation(field.to_owned()));
    }
    if trimmed.contains('/') {
        return Err(TargetError::InvalidCharacter {
            field: field.to_owned(),
            value: trimmed.to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}

/// Project and zone pair that scopes every zonal API call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZoneScope {
    /// Project identifier (for example `my-project-123`).
    pub project_id: String,
    /// Zone name (for example `us-central1-c`).
    pub zone: String,
}

impl ZoneScope {
    /// Builds a scope, trimming both values.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] when either value is blank or contains `/`.
    pub fn new(project_id: &str, zone: &str) -> Result<Self, TargetError> {
        Ok(Self {
            project_id: require_segment("project_id", project_id)?,
            zone: require_segment("zone", zone)?,
        })
    }

    /// Addresses an instance inside this scope.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] when the instance identifier is invalid.
    pub fn instance(&self, instance: &str) -> Result<InstanceRef, TargetError> {
        Ok(InstanceRef {
            scope: self.clone(),
            instance: require_segment("instance", instance)?,
        })
    }

    /// Addresses a zone operation inside this scope.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] when the operation name is invalid.
    pub fn operation(&self, name: &str) -> Result<OperationRef, TargetError> {
        Ok(OperationRef {
            scope: self.clone(),
            name: require_segment("operation", name)?,
        })
    }
}

impl fmt::Display for ZoneScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.zone)
    }
}

/// Fully qualified reference to a single instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceRef {
    /// Project and zone that own the instance.
    pub scope: ZoneScope,
    /// Instance name or numeric identifier.
    pub instance: String,
}

impl InstanceRef {
    /// Starts a builder for an [`InstanceRef`].
    #[must_use]
    pub fn builder() -> InstanceRefBuilder {
        InstanceRefBuilder::new()
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.instance)
    }
}

/// Builder for [`InstanceRef`] that trims and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstanceRefBuilder {
    project_id: String,
    zone: String,
    instance: String,
}

impl InstanceRefBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project identifier.
    #[must_use]
    pub fn project_id(mut self, value: impl Into<String>) -> Self {
        self.project_id = value.into();
        self
    }

    /// Sets the zone.
    #[must_use]
    pub fn zone(mut self, value: impl Into<String>) -> Self {
        self.zone = value.into();
        self
    }

    /// Sets the instance name or identifier.
    #[must_use]
    pub fn instance(mut self, value: impl Into<String>) -> Self {
        self.instance = value.into();
        self
    }

    /// Builds and validates the [`InstanceRef`].
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] when any field is blank or contains `/`.
    pub fn build(self) -> Result<InstanceRef, TargetError> {
        ZoneScope::new(&self.project_id, &self.zone)?.instance(&self.instance)
    }
}

/// Fully qualified reference to a zone operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperationRef {
    /// Project and zone that own the operation.
    pub scope: ZoneScope,
    /// Operation name returned by the mutating call.
    pub name: String,
}

/// Instance status as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceStatus {
    /// Resources are being allocated.
    Provisioning,
    /// Resources are acquired and the instance is preparing for first boot.
    Staging,
    /// The instance is booting or running.
    Running,
    /// The instance is being stopped.
    Stopping,
    /// The instance stopped successfully.
    Stopped,
    /// The instance is being suspended.
    Suspending,
    /// The instance is suspended.
    Suspended,
    /// The instance is under repair by the provider.
    Repairing,
    /// The instance is stopped and holds no compute resources.
    Terminated,
    /// Any status this crate does not know about.
    Other(String),
}

impl InstanceStatus {
    /// Returns the provider spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Provisioning => "PROVISIONING",
            Self::Staging => "STAGING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Suspending => "SUSPENDING",
            Self::Suspended => "SUSPENDED",
            Self::Repairing => "REPAIRING",
            Self::Terminated => "TERMINATED",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for InstanceStatus {
    fn from(value: &str) -> Self {
        match value {
            "PROVISIONING" => Self::Provisioning,
            "STAGING" => Self::Staging,
            "RUNNING" => Self::Running,
            "STOPPING" => Self::Stopping,
            "STOPPED" => Self::Stopped,
            "SUSPENDING" => Self::Suspending,
            "SUSPENDED" => Self::Suspended,
            "REPAIRING" => Self::Repairing,
            "TERMINATED" => Self::Terminated,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an instance as returned by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    /// Provider assigned numeric identifier.
    pub id: String,
    /// Instance name.
    pub name: String,
    /// Current status.
    pub status: InstanceStatus,
    /// Optional human readable explanation of the status.
    pub status_message: Option<String>,
}

/// Zone operation status.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OperationStatus {
    /// Queued by the provider.
    Pending,
    /// In progress.
    Running,
    /// Finished, successfully or not.
    Done,
    /// Any status this crate does not know about.
    Other(String),
}

impl OperationStatus {
    /// Returns `true` once the operation reached its terminal status.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the provider spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for OperationStatus {
    fn from(value: &str) -> Self {
        match value {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "DONE" => Self::Done,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single error entry embedded in a finished operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperationErrorEntry {
    /// Provider error code (for example `ZONE_RESOURCE_POOL_EXHAUSTED`).
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// Optional field or resource the error refers to.
    pub location: Option<String>,
}

impl fmt::Display for OperationErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " (at {location})")?;
        }
        Ok(())
    }
}

/// Long-running zone operation created by a mutating call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Operation {
    /// Operation name used to poll for completion.
    pub name: String,
    /// Current status.
    pub status: OperationStatus,
    /// Errors reported once the operation is done, in provider order.
    pub errors: Vec<OperationErrorEntry>,
    /// Warning messages attached to the operation.
    pub warnings: Vec<String>,
}

impl Operation {
    /// Converts a finished operation into a result, failing when the provider
    /// embedded any errors.
    ///
    /// # Errors
    ///
    /// Returns [`OperationFailure`] carrying every embedded error entry.
    pub fn into_result(self) -> Result<Self, OperationFailure> {
        if self.errors.is_empty() {
            return Ok(self);
        }
        Err(OperationFailure {
            operation: self.name,
            errors: self.errors,
        })
    }
}

fn join_entries(entries: &[OperationErrorEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Aggregated failure reported by a finished operation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("operation {operation} completed with error: {}", join_entries(.errors))]
pub struct OperationFailure {
    /// Name of the failed operation.
    pub operation: String,
    /// Every embedded error, in provider order.
    pub errors: Vec<OperationErrorEntry>,
}

/// State transition requested on an instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleAction {
    /// Boot a terminated instance.
    Start,
    /// Stop a running instance.
    Stop,
    /// Suspend an instance, preserving memory.
    Suspend,
    /// Resume a suspended instance.
    Resume,
}

impl LifecycleAction {
    /// Endpoint suffix and verb used by the provider (`start`, `stop`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
        }
    }

    /// Past participle used in console output.
    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Stop => "stopped",
            Self::Suspend => "suspended",
            Self::Resume => "resumed",
        }
    }

    /// Returns `true` when the current status allows this transition.
    #[must_use]
    pub const fn admits(self, status: &InstanceStatus) -> bool {
        match self {
            Self::Start => matches!(status, InstanceStatus::Terminated),
            Self::Stop => !matches!(status, InstanceStatus::Terminated),
            Self::Suspend => !matches!(status, InstanceStatus::Suspended),
            Self::Resume => matches!(status, InstanceStatus::Suspended),
        }
    }

    /// Describes the status required by [`Self::admits`].
    #[must_use]
    pub const fn requirement(self) -> &'static str {
        match self {
            Self::Start => "status TERMINATED",
            Self::Stop => "any status other than TERMINATED",
            Self::Suspend => "any status other than SUSPENDED",
            Self::Resume => "status SUSPENDED",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification hooks the controller needs from provider errors.
pub trait ProviderError: std::error::Error {
    /// Returns `true` when the provider refused a request because the
    /// resource was not in a compatible state.
    fn is_conflict(&self) -> bool;
}

/// Future returned by compute API calls.
pub type ComputeFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal interface over the provider's compute management API.
pub trait ComputeApi {
    /// Provider specific error type.
    type Error: ProviderError + Send + Sync + 'static;

    /// Lists every instance in the scope.
    fn list_instances<'a>(
        &'a self,
        scope: &'a ZoneScope,
    ) -> ComputeFuture<'a, Vec<Instance>, Self::Error>;

    /// Fetches a single instance.
    fn get_instance<'a>(&'a self, target: &'a InstanceRef)
    -> ComputeFuture<'a, Instance, Self::Error>;

    /// Requests a state transition and returns the operation tracking it.
    fn request_transition<'a>(
        &'a self,
        target: &'a InstanceRef,
        action: LifecycleAction,
    ) -> ComputeFuture<'a, Operation, Self::Error>;

    /// Fetches the current state of a zone operation.
    fn get_zone_operation<'a>(
        &'a self,
        operation: &'a OperationRef,
    ) -> ComputeFuture<'a, Operation, Self::Error>;
}
