//! BDD step definitions for instance lifecycle control.

use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use vmctl::test_support::{ComputeCall, ScriptedComputeError, error_entry};
use vmctl::{
    ControlError, InstanceController, InstanceStatus, LifecycleAction, OperationStatus, WaitError,
};

use super::test_helpers::{ControlContext, ControlOutcome};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn parse_action(value: &str) -> Result<LifecycleAction, StepError> {
    match value {
        "start" => Ok(LifecycleAction::Start),
        "stop" => Ok(LifecycleAction::Stop),
        "suspend" => Ok(LifecycleAction::Suspend),
        "resume" => Ok(LifecycleAction::Resume),
        other => Err(StepError::UnknownAction(other.to_owned())),
    }
}

fn classify(error: ControlError<ScriptedComputeError>) -> ControlOutcome {
    match error {
        ControlError::Precondition { .. } => ControlOutcome::Precondition(error.to_string()),
        ControlError::Rejected { .. } => ControlOutcome::Rejected(error.to_string()),
        ControlError::Wait(WaitError::Failed(failure)) => ControlOutcome::OperationFailed(
            failure.errors.into_iter().map(|entry| entry.code).collect(),
        ),
        ControlError::Wait(WaitError::AttemptsExhausted { attempts, .. }) => {
            ControlOutcome::AttemptsExhausted(attempts)
        }
        other => ControlOutcome::Other(other.to_string()),
    }
}

fn outcome(control_context: &ControlContext) -> Result<&ControlOutcome, StepError> {
    control_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("no transition was requested")))
}

#[given("an instance in status \"{status}\"")]
fn instance_in_status(control_context: ControlContext, status: String) -> ControlContext {
    control_context
        .api
        .push_status(InstanceStatus::from(status.as_str()));
    control_context
}

#[given("the operation stays pending for \"{polls}\" polls")]
fn operation_pending_for(control_context: ControlContext, polls: u32) -> ControlContext {
    for _ in 0..polls {
        control_context
            .api
            .push_operation(OperationStatus::Running, Vec::new());
    }
    control_context
        .api
        .push_operation(OperationStatus::Done, Vec::new());
    control_context
}

#[given("the operation finishes immediately")]
fn operation_finishes(control_context: ControlContext) -> ControlContext {
    control_context
        .api
        .push_operation(OperationStatus::Done, Vec::new());
    control_context
}

#[given("the operation finishes with errors \"{first}\" and \"{second}\"")]
fn operation_finishes_with_errors(
    control_context: ControlContext,
    first: String,
    second: String,
) -> ControlContext {
    control_context.api.push_operation(
        OperationStatus::Done,
        vec![
            error_entry(&first, "first failure"),
            error_entry(&second, "second failure"),
        ],
    );
    control_context
}

#[given("the provider rejects transitions as conflicts")]
fn provider_rejects(control_context: ControlContext) -> ControlContext {
    control_context
        .api
        .fail_transitions(ScriptedComputeError::Conflict);
    control_context
}

#[given("the operation never finishes")]
fn operation_never_finishes(control_context: ControlContext) -> ControlContext {
    control_context
        .api
        .repeat_operation(OperationStatus::Running);
    control_context
}

#[given("the wait is limited to \"{attempts}\" polls")]
fn wait_limited(mut control_context: ControlContext, attempts: u32) -> ControlContext {
    control_context.policy = control_context.policy.with_max_attempts(attempts);
    control_context
}

#[when("I request \"{action}\" on the instance")]
fn request_transition(
    control_context: ControlContext,
    action: String,
) -> Result<ControlContext, StepError> {
    let lifecycle = parse_action(&action)?;
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let controller = InstanceController::new(control_context.api.clone(), control_context.policy);
    let target = control_context.target.clone();

    let result = runtime.block_on(async move { controller.transition(&target, lifecycle).await });
    let outcome = match result {
        Ok(transition) => ControlOutcome::Completed {
            operation: transition.operation,
        },
        Err(err) => classify(err),
    };

    Ok(ControlContext {
        outcome: Some(outcome),
        ..control_context
    })
}

#[then("the transition succeeds")]
fn transition_succeeds(control_context: &ControlContext) -> Result<(), StepError> {
    match outcome(control_context)? {
        ControlOutcome::Completed { .. } => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected success, got {other:?}"
        ))),
    }
}

#[then("the transition is refused by its precondition")]
fn transition_refused(control_context: &ControlContext) -> Result<(), StepError> {
    match outcome(control_context)? {
        ControlOutcome::Precondition(_) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected precondition failure, got {other:?}"
        ))),
    }
}

#[then("the transition is rejected by the provider")]
fn transition_rejected(control_context: &ControlContext) -> Result<(), StepError> {
    match outcome(control_context)? {
        ControlOutcome::Rejected(_) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected provider rejection, got {other:?}"
        ))),
    }
}

#[then("the transition fails listing \"{first}\" before \"{second}\"")]
fn transition_fails_listing(
    control_context: &ControlContext,
    first: String,
    second: String,
) -> Result<(), StepError> {
    match outcome(control_context)? {
        ControlOutcome::OperationFailed(codes) if *codes == [first.clone(), second.clone()] => {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected operation errors [{first}, {second}], got {other:?}"
        ))),
    }
}

#[then("the wait stops after \"{attempts}\" polls")]
fn wait_stops_after(control_context: &ControlContext, attempts: u32) -> Result<(), StepError> {
    match outcome(control_context)? {
        ControlOutcome::AttemptsExhausted(count) if *count == attempts => {}
        other => {
            return Err(StepError::Assertion(format!(
                "expected {attempts} exhausted polls, got {other:?}"
            )));
        }
    }
    assert_polls(control_context, usize::try_from(attempts).unwrap_or(usize::MAX))
}

#[then("a \"{action}\" request was sent")]
fn request_sent(control_context: &ControlContext, action: String) -> Result<(), StepError> {
    let lifecycle = parse_action(&action)?;
    let expected = ComputeCall::Transition(lifecycle, control_context.target.instance.clone());
    if control_context.api.calls().contains(&expected) {
        return Ok(());
    }
    Err(StepError::Assertion(format!(
        "expected {expected:?} in {:?}",
        control_context.api.calls()
    )))
}

#[then("no \"{action}\" request was sent")]
fn request_not_sent(control_context: &ControlContext, action: String) -> Result<(), StepError> {
    let lifecycle = parse_action(&action)?;
    let sent = control_context
        .api
        .calls()
        .iter()
        .any(|call| matches!(call, ComputeCall::Transition(made, _) if *made == lifecycle));
    if sent {
        return Err(StepError::Assertion(format!(
            "{action} should not have been requested"
        )));
    }
    Ok(())
}

#[then("the operation was polled \"{count}\" times")]
fn polled_times(control_context: &ControlContext, count: usize) -> Result<(), StepError> {
    assert_polls(control_context, count)
}

fn assert_polls(control_context: &ControlContext, count: usize) -> Result<(), StepError> {
    let polls = control_context.api.operation_polls();
    if polls == count {
        return Ok(());
    }
    Err(StepError::Assertion(format!(
        "expected {count} polls, got {polls}"
    )))
}
