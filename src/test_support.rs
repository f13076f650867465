//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard as StdMutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::compute::{
    ComputeApi, ComputeFuture, Instance, InstanceRef, InstanceStatus, LifecycleAction, Operation,
    OperationErrorEntry, OperationRef, OperationStatus, ProviderError, ZoneScope,
};

/// Errors produced by [`ScriptedCompute`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedComputeError {
    /// Raised when a call has no scripted response left.
    #[error("no scripted response for {0}")]
    Exhausted(String),
    /// Simulated transport failure.
    #[error("simulated transport failure")]
    Transport,
    /// Simulated provider-side conflict.
    #[error("simulated conflict")]
    Conflict,
}

impl ProviderError for ScriptedComputeError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Records a single call made through [`ScriptedCompute`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComputeCall {
    /// `list_instances` for the given zone.
    ListInstances(String),
    /// `get_instance` for the given instance.
    GetInstance(String),
    /// `request_transition` for the given action and instance.
    Transition(LifecycleAction, String),
    /// `get_zone_operation` for the given operation name.
    GetOperation(String),
}

#[derive(Debug, Default)]
struct State {
    instances: Vec<Instance>,
    statuses: VecDeque<Result<InstanceStatus, ScriptedComputeError>>,
    transition_error: Option<ScriptedComputeError>,
    operations: VecDeque<Result<Operation, ScriptedComputeError>>,
    fallback_operation: Option<Operation>,
    calls: Vec<ComputeCall>,
}

/// Scripted compute provider that replays queued responses in FIFO order.
///
/// Clones share state, so a test can keep a handle while the controller owns
/// another.
#[derive(Clone, Debug, Default)]
pub struct ScriptedCompute {
    state: Arc<Mutex<State>>,
}

/// Operation name returned by every scripted transition.
pub const SCRIPTED_OPERATION: &str = "operation-scripted";

impl ScriptedCompute {
    /// Creates a provider with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StdMutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an instance returned by `list_instances`.
    pub fn push_listed(&self, name: &str, status: InstanceStatus) {
        self.state().instances.push(instance(name, status));
    }

    /// Queues the status returned by the next `get_instance` call.
    pub fn push_status(&self, status: InstanceStatus) {
        self.state().statuses.push_back(Ok(status));
    }

    /// Queues a failure for the next `get_instance` call.
    pub fn push_status_error(&self, error: ScriptedComputeError) {
        self.state().statuses.push_back(Err(error));
    }

    /// Makes every subsequent transition request fail with `error`.
    pub fn fail_transitions(&self, error: ScriptedComputeError) {
        self.state().transition_error = Some(error);
    }

    /// Queues an operation snapshot for the next poll.
    pub fn push_operation(&self, status: OperationStatus, errors: Vec<OperationErrorEntry>) {
        self.state().operations.push_back(Ok(operation(status, errors)));
    }

    /// Queues a failure for the next poll.
    pub fn push_operation_error(&self, error: ScriptedComputeError) {
        self.state().operations.push_back(Err(error));
    }

    /// Returns `status` for every poll once the queue is empty.
    pub fn repeat_operation(&self, status: OperationStatus) {
        self.state().fallback_operation = Some(operation(status, Vec::new()));
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ComputeCall> {
        self.state().calls.clone()
    }

    /// Counts recorded transition requests.
    #[must_use]
    pub fn transition_calls(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, ComputeCall::Transition(..)))
            .count()
    }

    /// Counts recorded operation polls.
    #[must_use]
    pub fn operation_polls(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, ComputeCall::GetOperation(_)))
            .count()
    }
}

/// Builds an instance snapshot with a fixed identifier.
#[must_use]
pub fn instance(name: &str, status: InstanceStatus) -> Instance {
    Instance {
        id: format!("{name}-id"),
        name: name.to_owned(),
        status,
        status_message: None,
    }
}

/// Builds an operation snapshot named [`SCRIPTED_OPERATION`].
#[must_use]
pub fn operation(status: OperationStatus, errors: Vec<OperationErrorEntry>) -> Operation {
    Operation {
        name: SCRIPTED_OPERATION.to_owned(),
        status,
        errors,
        warnings: Vec::new(),
    }
}

/// Builds an embedded operation error entry.
#[must_use]
pub fn error_entry(code: &str, message: &str) -> OperationErrorEntry {
    OperationErrorEntry {
        code: code.to_owned(),
        message: message.to_owned(),
        location: None,
    }
}

impl ComputeApi for ScriptedCompute {
    type Error = ScriptedComputeError;

    fn list_instances<'a>(
        &'a self,
        scope: &'a ZoneScope,
    ) -> ComputeFuture<'a, Vec<Instance>, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(ComputeCall::ListInstances(scope.zone.clone()));
            Ok(state.instances.clone())
        })
    }

    fn get_instance<'a>(
        &'a self,
        target: &'a InstanceRef,
    ) -> ComputeFuture<'a, Instance, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state
                .calls
                .push(ComputeCall::GetInstance(target.instance.clone()));
            let status = state
                .statuses
                .pop_front()
                .unwrap_or_else(|| Err(ScriptedComputeError::Exhausted(String::from("instance"))))?;
            Ok(instance(&target.instance, status))
        })
    }

    fn request_transition<'a>(
        &'a self,
        target: &'a InstanceRef,
        action: LifecycleAction,
    ) -> ComputeFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state
                .calls
                .push(ComputeCall::Transition(action, target.instance.clone()));
            if let Some(error) = state.transition_error.clone() {
                return Err(error);
            }
            Ok(operation(OperationStatus::Pending, Vec::new()))
        })
    }

    fn get_zone_operation<'a>(
        &'a self,
        operation_ref: &'a OperationRef,
    ) -> ComputeFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state
                .calls
                .push(ComputeCall::GetOperation(operation_ref.name.clone()));
            if let Some(next) = state.operations.pop_front() {
                return next;
            }
            state
                .fallback_operation
                .clone()
                .ok_or_else(|| ScriptedComputeError::Exhausted(String::from("operation")))
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
