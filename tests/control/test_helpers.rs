//! Shared fixtures for instance control BDD scenarios.

use std::time::Duration;

use rstest::fixture;
use vmctl::test_support::ScriptedCompute;
use vmctl::{InstanceRef, WaitPolicy};

/// Poll interval used by scenarios so waits finish quickly.
const FAST_POLL: Duration = Duration::from_millis(1);

#[derive(Clone, Debug)]
pub struct ControlContext {
    pub api: ScriptedCompute,
    pub target: InstanceRef,
    pub policy: WaitPolicy,
    pub outcome: Option<ControlOutcome>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlOutcome {
    Completed { operation: String },
    Precondition(String),
    Rejected(String),
    OperationFailed(Vec<String>),
    AttemptsExhausted(u32),
    Other(String),
}

#[fixture]
pub fn control_context() -> ControlContext {
    let target = InstanceRef::builder()
        .project_id("demo-project")
        .zone("us-central1-c")
        .instance("web-1")
        .build()
        .unwrap_or_else(|err| panic!("target fixture should build: {err}"));

    ControlContext {
        api: ScriptedCompute::new(),
        target,
        policy: WaitPolicy::default()
            .with_poll_interval(FAST_POLL)
            .with_backoff(1, FAST_POLL),
        outcome: None,
    }
}
