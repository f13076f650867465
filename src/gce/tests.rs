//! Unit tests for URL construction and error mapping.

use reqwest::StatusCode;
use rstest::{fixture, rstest};

use super::{GceClient, GceError, TokenSource, api_error};
use crate::compute::{InstanceRef, LifecycleAction, ProviderError, ZoneScope};

#[fixture]
fn client() -> GceClient {
    GceClient::with_token_source(
        reqwest::Client::new(),
        "http://127.0.0.1:1/compute/v1/",
        TokenSource::fixed("token"),
    )
    .unwrap_or_else(|err| panic!("client should build: {err}"))
}

fn target() -> InstanceRef {
    InstanceRef::builder()
        .project_id("demo-project")
        .zone("us-central1-c")
        .instance("web-1")
        .build()
        .unwrap_or_else(|err| panic!("target should build: {err}"))
}

#[rstest]
fn instances_url_nests_project_and_zone(client: GceClient) {
    let scope = ZoneScope::new("demo-project", "us-central1-c")
        .unwrap_or_else(|err| panic!("scope should build: {err}"));
    let url = client
        .instances_url(&scope)
        .unwrap_or_else(|err| panic!("url should build: {err}"));

    assert_eq!(
        url.as_str(),
        "http://127.0.0.1:1/compute/v1/projects/demo-project/zones/us-central1-c/instances"
    );
}

#[rstest]
#[case(LifecycleAction::Start, "start")]
#[case(LifecycleAction::Stop, "stop")]
#[case(LifecycleAction::Suspend, "suspend")]
#[case(LifecycleAction::Resume, "resume")]
fn action_url_appends_verb(client: GceClient, #[case] action: LifecycleAction, #[case] verb: &str) {
    let url = client
        .action_url(&target(), action)
        .unwrap_or_else(|err| panic!("url should build: {err}"));

    assert_eq!(
        url.path(),
        format!("/compute/v1/projects/demo-project/zones/us-central1-c/instances/web-1/{verb}")
    );
}

#[rstest]
fn operation_url_uses_zone_operations(client: GceClient) {
    let operation = target()
        .scope
        .operation("operation-123")
        .unwrap_or_else(|err| panic!("operation should build: {err}"));
    let url = client
        .operation_url(&operation)
        .unwrap_or_else(|err| panic!("url should build: {err}"));

    assert_eq!(
        url.path(),
        "/compute/v1/projects/demo-project/zones/us-central1-c/operations/operation-123"
    );
}

#[test]
fn rejects_base_that_cannot_hold_paths() {
    let err = GceClient::with_token_source(
        reqwest::Client::new(),
        "mailto:ops@example.com",
        TokenSource::fixed("token"),
    )
    .expect_err("non-hierarchical base should fail");

    assert!(matches!(err, GceError::Endpoint { .. }), "got {err:?}");
}

#[test]
fn not_found_maps_to_missing_resource() {
    let err = api_error(StatusCode::NOT_FOUND, b"{}", "/instances/ghost");

    assert_eq!(
        err,
        GceError::NotFound {
            resource: String::from("/instances/ghost"),
        }
    );
    assert!(!err.is_conflict());
}

#[test]
fn decodes_error_envelope_reason() {
    let body = br#"{
      "error": {
        "code": 400,
        "message": "The resource 'web-1' is not ready",
        "errors": [{"reason": "resourceNotReady", "domain": "global"}]
      }
    }"#;
    let err = api_error(StatusCode::BAD_REQUEST, body, "/instances/web-1/stop");

    assert_eq!(
        err,
        GceError::Api {
            status: 400,
            reason: Some(String::from("resourceNotReady")),
            message: String::from("The resource 'web-1' is not ready"),
        }
    );
    assert!(err.is_conflict());
}

#[test]
fn keeps_raw_body_when_envelope_is_missing() {
    let err = api_error(StatusCode::BAD_GATEWAY, b"upstream hiccup", "/instances");

    assert_eq!(
        err,
        GceError::Api {
            status: 502,
            reason: None,
            message: String::from("upstream hiccup"),
        }
    );
    assert!(!err.is_conflict());
}

#[rstest]
#[case(409, None, true)]
#[case(412, None, true)]
#[case(400, Some("conditionNotMet"), true)]
#[case(400, Some("conflict"), true)]
#[case(403, Some("forbidden"), false)]
#[case(500, None, false)]
fn classifies_conflicts(#[case] status: u16, #[case] reason: Option<&str>, #[case] conflict: bool) {
    let err = GceError::Api {
        status,
        reason: reason.map(str::to_owned),
        message: String::from("boom"),
    };
    assert_eq!(err.is_conflict(), conflict);
}

#[test]
fn transport_errors_are_not_conflicts() {
    let err = GceError::Transport {
        message: String::from("connection refused"),
    };
    assert!(!err.is_conflict());
}
