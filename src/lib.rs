//! Core library for the vmctl Compute Engine lifecycle tool.
//!
//! The crate exposes a compute API abstraction, a REST implementation for
//! Google Compute Engine, and an instance controller that gates every state
//! transition on a fresh status read and waits for the resulting zone
//! operation to finish.

pub mod compute;
pub mod config;
pub mod control;
pub mod credentials;
pub mod gce;
pub mod report;
pub mod session;
pub mod telemetry;
pub mod test_support;
pub mod wait;

pub use compute::{
    ComputeApi, Instance, InstanceRef, InstanceRefBuilder, InstanceStatus, LifecycleAction,
    Operation, OperationFailure, OperationRef, OperationStatus, ProviderError, TargetError,
    ZoneScope,
};
pub use config::{ComputeConfig, ConfigError, TargetOverrides};
pub use control::{ControlError, InstanceController, Transition};
pub use credentials::{Credentials, CredentialsError};
pub use gce::{GceClient, GceError};
pub use session::{Session, SessionError};
pub use wait::{OperationWaiter, WaitError, WaitPolicy};
