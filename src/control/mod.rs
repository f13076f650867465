//! Instance lifecycle control: list, get, and gated state transitions.
//!
//! Every transition reads the instance status first and refuses to issue the
//! mutating call when the status does not admit it. Accepted transitions
//! wait for the resulting zone operation before returning.
//!
//! The status read and the mutating call are separate round trips, so the
//! instance can change state in between. When the provider refuses the call
//! as a conflict, the failure is reported as [`ControlError::Rejected`]
//! rather than a generic API error.
//!
//! Every provider call races the controller's cancellation token. Once the
//! token fires no further request is started, so an interrupted transition
//! never reaches the mutating call.

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::compute::{
    ComputeApi, Instance, InstanceRef, InstanceStatus, LifecycleAction, OperationRef,
    ProviderError, ZoneScope,
};
use crate::wait::{OperationWaiter, WaitError, WaitPolicy};

/// Errors surfaced by [`InstanceController`].
#[derive(Debug, Error)]
pub enum ControlError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when a provider call fails.
    #[error("provider request failed: {0}")]
    Api(#[source] E),
    /// Raised when the instance status does not admit the transition.
    #[error("instance {instance} is {status}; {action} requires {requirement}")]
    Precondition {
        /// Instance the transition targeted.
        instance: String,
        /// Requested transition.
        action: LifecycleAction,
        /// Status observed before the call.
        status: InstanceStatus,
        /// Description of the admissible status.
        requirement: &'static str,
    },
    /// Raised when the provider refused the transition as a conflict.
    #[error("provider rejected {action} for instance {instance}: {source}")]
    Rejected {
        /// Instance the transition targeted.
        instance: String,
        /// Requested transition.
        action: LifecycleAction,
        /// Provider error describing the conflict.
        #[source]
        source: E,
    },
    /// Raised when waiting for the transition's operation fails.
    #[error("wait for operation failed: {0}")]
    Wait(#[source] WaitError<E>),
    /// Raised when the cancellation token fired before or during a provider
    /// call.
    #[error("{step} was cancelled")]
    Cancelled {
        /// Provider call that was abandoned.
        step: &'static str,
    },
}

/// Outcome of a completed transition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    /// Instance the transition targeted.
    pub instance: String,
    /// Transition that completed.
    pub action: LifecycleAction,
    /// Name of the operation that tracked it.
    pub operation: String,
}

/// Runs lifecycle operations against a compute API.
#[derive(Clone, Debug)]
pub struct InstanceController<A> {
    api: A,
    waiter: OperationWaiter,
    cancel: CancellationToken,
}

impl<A> InstanceController<A>
where
    A: ComputeApi,
{
    /// Creates a controller that waits according to `policy`.
    #[must_use]
    pub fn new(api: A, policy: WaitPolicy) -> Self {
        Self {
            api,
            waiter: OperationWaiter::new(policy),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the token used to cancel provider calls and in-flight waits.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the underlying compute API.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Lists every instance in `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Api`] when the provider call fails and
    /// [`ControlError::Cancelled`] when the token fires first.
    pub async fn list(&self, scope: &ZoneScope) -> Result<Vec<Instance>, ControlError<A::Error>> {
        let instances = self
            .guarded("instance listing", self.api.list_instances(scope))
            .await?
            .map_err(ControlError::Api)?;
        debug!(%scope, count = instances.len(), "listed instances");
        Ok(instances)
    }

    /// Fetches a single instance.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Api`] when the provider call fails and
    /// [`ControlError::Cancelled`] when the token fires first.
    pub async fn get(&self, target: &InstanceRef) -> Result<Instance, ControlError<A::Error>> {
        self.guarded("instance lookup", self.api.get_instance(target))
            .await?
            .map_err(ControlError::Api)
    }

    /// Starts a `TERMINATED` instance and waits for the operation.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn start(&self, target: &InstanceRef) -> Result<Transition, ControlError<A::Error>> {
        self.transition(target, LifecycleAction::Start).await
    }

    /// Stops an instance that is not `TERMINATED` and waits for the operation.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn stop(&self, target: &InstanceRef) -> Result<Transition, ControlError<A::Error>> {
        self.transition(target, LifecycleAction::Stop).await
    }

    /// Suspends an instance that is not `SUSPENDED` and waits for the
    /// operation.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn suspend(
        &self,
        target: &InstanceRef,
    ) -> Result<Transition, ControlError<A::Error>> {
        self.transition(target, LifecycleAction::Suspend).await
    }

    /// Resumes a `SUSPENDED` instance and waits for the operation.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn resume(&self, target: &InstanceRef) -> Result<Transition, ControlError<A::Error>> {
        self.transition(target, LifecycleAction::Resume).await
    }

    /// Runs a gated transition: status read, precondition check, mutating
    /// call, then wait.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Precondition`] without issuing the transition
    /// when the observed status does not admit it, [`ControlError::Rejected`]
    /// when the provider refuses the call as a conflict,
    /// [`ControlError::Api`] for other provider failures,
    /// [`ControlError::Cancelled`] when the token fires before the mutating
    /// call is sent, and [`ControlError::Wait`] when the operation fails or
    /// the wait stops.
    pub async fn transition(
        &self,
        target: &InstanceRef,
        action: LifecycleAction,
    ) -> Result<Transition, ControlError<A::Error>> {
        let current = self.get(target).await?;
        if !action.admits(&current.status) {
            return Err(ControlError::Precondition {
                instance: target.instance.clone(),
                action,
                status: current.status,
                requirement: action.requirement(),
            });
        }

        let request = self.api.request_transition(target, action);
        let pending = match self.guarded("transition request", request).await? {
            Ok(operation) => operation,
            Err(err) if err.is_conflict() => {
                return Err(ControlError::Rejected {
                    instance: target.instance.clone(),
                    action,
                    source: err,
                });
            }
            Err(err) => return Err(ControlError::Api(err)),
        };
        info!(
            instance = %target.instance,
            %action,
            operation = %pending.name,
            "waiting for operation"
        );

        let operation_ref = OperationRef {
            scope: target.scope.clone(),
            name: pending.name,
        };
        let finished = self
            .waiter
            .wait(&self.api, &operation_ref, &self.cancel)
            .await
            .map_err(ControlError::Wait)?;

        Ok(Transition {
            instance: target.instance.clone(),
            action,
            operation: finished.name,
        })
    }

    /// Runs `call` unless the cancellation token fires first. A token that
    /// is already cancelled wins without polling `call`, so no request is
    /// sent.
    async fn guarded<T, F>(
        &self,
        step: &'static str,
        call: F,
    ) -> Result<Result<T, A::Error>, ControlError<A::Error>>
    where
        F: Future<Output = Result<T, A::Error>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(step, "provider call cancelled");
                Err(ControlError::Cancelled { step })
            }
            result = call => Ok(result),
        }
    }
}
