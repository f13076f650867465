//! Unit tests for configuration loading and validation.

use std::time::Duration;

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use rstest::*;
use tempfile::TempDir;
use vmctl::config::{ConfigError, DEFAULT_ZONE};
use vmctl::gce::DEFAULT_API_BASE;
use vmctl::test_support::EnvGuard;
use vmctl::{ComputeConfig, TargetOverrides, WaitPolicy};

#[fixture]
fn valid_config() -> ComputeConfig {
    ComputeConfig {
        credentials_file: None,
        project_id: Some(String::from("demo-project")),
        zone: String::from(DEFAULT_ZONE),
        api_base: String::from(DEFAULT_API_BASE),
        poll_interval_ms: 2000,
        max_poll_interval_ms: 2000,
        poll_backoff_factor: 1,
        wait_timeout_secs: 600,
        max_poll_attempts: None,
        request_timeout_secs: 30,
    }
}

#[rstest]
#[case::zone(|cfg: &mut ComputeConfig| cfg.zone.clear(), "VMCTL_ZONE", "zone")]
#[case::api_base(|cfg: &mut ComputeConfig| cfg.api_base = String::from(" "), "VMCTL_API_BASE", "api_base")]
#[case::project(|cfg: &mut ComputeConfig| cfg.project_id = Some(String::new()), "VMCTL_PROJECT_ID", "project_id")]
#[case::credentials(
    |cfg: &mut ComputeConfig| cfg.credentials_file = Some(String::from("  ")),
    "VMCTL_CREDENTIALS_FILE",
    "credentials_file"
)]
#[case::poll_interval(|cfg: &mut ComputeConfig| cfg.poll_interval_ms = 0, "VMCTL_POLL_INTERVAL_MS", "poll_interval_ms")]
#[case::backoff(|cfg: &mut ComputeConfig| cfg.poll_backoff_factor = 0, "VMCTL_POLL_BACKOFF_FACTOR", "poll_backoff_factor")]
#[case::timeout(|cfg: &mut ComputeConfig| cfg.wait_timeout_secs = 0, "VMCTL_WAIT_TIMEOUT_SECS", "wait_timeout_secs")]
#[case::attempts(|cfg: &mut ComputeConfig| cfg.max_poll_attempts = Some(0), "VMCTL_MAX_POLL_ATTEMPTS", "max_poll_attempts")]
fn validation_produces_actionable_errors(
    valid_config: ComputeConfig,
    #[case] mutate: fn(&mut ComputeConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = valid_config;
    mutate(&mut cfg);

    let message = cfg
        .validate()
        .expect_err("validation should fail")
        .to_string();
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains("vmctl.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[rstest]
fn defaults_validate(valid_config: ComputeConfig) {
    assert_eq!(valid_config.validate(), Ok(()));
}

#[rstest]
fn default_knobs_match_default_wait_policy(valid_config: ComputeConfig) {
    assert_eq!(valid_config.wait_policy(), WaitPolicy::default());
    assert_eq!(valid_config.request_timeout(), Duration::from_secs(30));
}

#[rstest]
fn wait_policy_reflects_polling_knobs(valid_config: ComputeConfig) {
    let cfg = ComputeConfig {
        poll_interval_ms: 500,
        max_poll_interval_ms: 8000,
        poll_backoff_factor: 2,
        wait_timeout_secs: 120,
        max_poll_attempts: Some(40),
        ..valid_config
    };

    assert_eq!(
        cfg.wait_policy(),
        WaitPolicy::default()
            .with_poll_interval(Duration::from_millis(500))
            .with_backoff(2, Duration::from_secs(8))
            .with_timeout(Duration::from_secs(120))
            .with_max_attempts(40)
    );
}

#[rstest]
fn overrides_replace_only_supplied_values(valid_config: ComputeConfig) {
    let cfg = valid_config.with_overrides(&TargetOverrides {
        project_id: None,
        zone: Some(String::from("asia-east1-a")),
        wait_timeout_secs: Some(45),
    });

    assert_eq!(cfg.project_id.as_deref(), Some("demo-project"));
    assert_eq!(cfg.zone, "asia-east1-a");
    assert_eq!(cfg.wait_timeout_secs, 45);
}

#[rstest]
fn scope_prefers_configured_project(valid_config: ComputeConfig) {
    let scope = valid_config
        .scope(Some("credentials-project"))
        .unwrap_or_else(|err| panic!("scope should resolve: {err}"));

    assert_eq!(scope.project_id, "demo-project");
    assert_eq!(scope.zone, DEFAULT_ZONE);
}

#[rstest]
fn scope_falls_back_to_credentials_project(valid_config: ComputeConfig) {
    let cfg = ComputeConfig {
        project_id: None,
        ..valid_config
    };

    let scope = cfg
        .scope(Some("credentials-project"))
        .unwrap_or_else(|err| panic!("scope should resolve: {err}"));
    assert_eq!(scope.project_id, "credentials-project");
}

#[rstest]
fn scope_without_any_project_is_actionable(valid_config: ComputeConfig) {
    let cfg = ComputeConfig {
        project_id: None,
        ..valid_config
    };

    let err = cfg.scope(None).expect_err("no project should fail");
    let ConfigError::MissingField(ref message) = err else {
        panic!("expected MissingField error, got {err:?}");
    };
    assert!(message.contains("VMCTL_PROJECT_ID"), "message: {message}");
}

#[rstest]
fn scope_rejects_zone_with_slash(valid_config: ComputeConfig) {
    let cfg = ComputeConfig {
        zone: String::from("us-central1/c"),
        ..valid_config
    };

    let err = cfg.scope(None).expect_err("slash should be rejected");
    assert!(matches!(err, ConfigError::Invalid(_)), "got {err:?}");
}

#[tokio::test]
async fn load_merges_config_file_and_environment() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
    Dir::open_ambient_dir(&root, ambient_authority())
        .unwrap_or_else(|err| panic!("open temp dir: {err}"))
        .write(
            "vmctl.toml",
            "project_id = \"from-file\"\nzone = \"europe-west1-b\"\npoll_interval_ms = 500\n",
        )
        .unwrap_or_else(|err| panic!("write config: {err}"));
    let config_path = root.join("vmctl.toml");

    let _guard = EnvGuard::set_vars(&[
        ("VMCTL_CONFIG_PATH", config_path.as_str()),
        ("VMCTL_ZONE", "europe-west4-a"),
        ("VMCTL_MAX_POLL_ATTEMPTS", "12"),
    ])
    .await;

    let cfg = ComputeConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("configuration should load: {err}"));

    assert_eq!(cfg.project_id.as_deref(), Some("from-file"));
    assert_eq!(cfg.zone, "europe-west4-a", "environment beats the file");
    assert_eq!(cfg.poll_interval_ms, 500);
    assert_eq!(cfg.max_poll_attempts, Some(12));
    assert_eq!(cfg.wait_timeout_secs, 600);
}
