//! BDD scenarios for instance lifecycle control.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ControlContext, control_context};

#[scenario(
    path = "tests/features/instance_control.feature",
    name = "Start a terminated instance"
)]
fn scenario_start_terminated(control_context: ControlContext) {
    drop(control_context);
}

#[scenario(
    path = "tests/features/instance_control.feature",
    name = "Refuse to start a running instance"
)]
fn scenario_start_running_refused(control_context: ControlContext) {
    drop(control_context);
}

#[scenario(
    path = "tests/features/instance_control.feature",
    name = "Refuse to stop a terminated instance"
)]
fn scenario_stop_terminated_refused(control_context: ControlContext) {
    drop(control_context);
}

#[scenario(
    path = "tests/features/instance_control.feature",
    name = "Refuse to suspend a suspended instance"
)]
fn scenario_suspend_suspended_refused(control_context: ControlContext) {
    drop(control_context);
}

#[scenario(
    path = "tests/features/instance_control.feature",
    name = "Resume a suspended instance"
)]
fn scenario_resume_suspended(control_context: ControlContext) {
    drop(control_context);
}

#[scenario(
    path = "tests/features/instance_control.feature",
    name = "Surface every operation error in order"
)]
fn scenario_operation_errors(control_context: ControlContext) {
    drop(control_context);
}

#[scenario(
    path = "tests/features/instance_control.feature",
    name = "Report provider conflicts as rejections"
)]
fn scenario_provider_conflict(control_context: ControlContext) {
    drop(control_context);
}

#[scenario(
    path = "tests/features/instance_control.feature",
    name = "Give up on an operation that never finishes"
)]
fn scenario_attempts_exhausted(control_context: ControlContext) {
    drop(control_context);
}
