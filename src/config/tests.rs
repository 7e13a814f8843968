//! Unit tests for edged configuration types and loading.

use std::time::Duration;

use clap::Parser;
use ortho_config::MergeComposer;
use ortho_config::serde_json::json;
use rstest::{fixture, rstest};
use serial_test::serial;

use super::*;

/// Fixture providing a default `AppConfig`.
#[fixture]
fn app_config() -> AppConfig {
    AppConfig::default()
}

/// Fixture providing an `AppConfig` parsed from a full TOML example.
#[fixture]
fn app_config_from_full_toml() -> AppConfig {
    let toml = r#"
        engine_socket = "unix:///run/containerd/containerd.sock"
        namespace = "edge"
        timeout_secs = 30
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Helper: Creates a `MergeComposer` with defaults layer already pushed.
fn create_composer_with_defaults() -> MergeComposer {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(AppConfig::default())
        .expect("serialization should succeed");
    composer.push_defaults(defaults);
    composer
}

/// Helper: Merges layers from a composer into `AppConfig`.
fn merge_config(composer: MergeComposer) -> AppConfig {
    AppConfig::merge_from_layers(composer.layers()).expect("merge should succeed")
}

/// Helper: Removes every environment variable the loader recognises.
fn clear_loader_env() {
    for name in env_var_names() {
        // SAFETY: tests are serialised; no concurrent env access.
        unsafe { std::env::remove_var(name) };
    }
}

#[rstest]
fn app_config_fields_default_to_none(app_config: AppConfig) {
    assert!(app_config.engine_socket.is_none());
    assert!(app_config.namespace.is_none());
    assert!(app_config.timeout_secs.is_none());
}

#[rstest]
fn namespace_falls_back_to_default(app_config: AppConfig) {
    assert_eq!(app_config.namespace_or_default(), "default");
}

#[rstest]
fn configured_namespace_is_used() {
    let config = AppConfig {
        namespace: Some(String::from("edge")),
        ..AppConfig::default()
    };
    assert_eq!(config.namespace_or_default(), "edge");
}

#[rstest]
#[case(None, None)]
#[case(Some(0), None)]
#[case(Some(30), Some(Duration::from_secs(30)))]
fn timeout_treats_zero_as_unbounded(
    #[case] timeout_secs: Option<u64>,
    #[case] expected: Option<Duration>,
) {
    let config = AppConfig {
        timeout_secs,
        ..AppConfig::default()
    };
    assert_eq!(config.timeout(), expected);
}

#[rstest]
fn app_config_toml_sets_all_fields(app_config_from_full_toml: AppConfig) {
    assert_eq!(
        app_config_from_full_toml.engine_socket.as_deref(),
        Some("unix:///run/containerd/containerd.sock")
    );
    assert_eq!(app_config_from_full_toml.namespace.as_deref(), Some("edge"));
    assert_eq!(app_config_from_full_toml.timeout_secs, Some(30));
}

#[rstest]
fn app_config_partial_toml_leaves_rest_unset() {
    let config: AppConfig = toml::from_str(r#"engine_socket = "unix:///tmp/engine.sock""#)
        .expect("TOML parsing should succeed");
    assert_eq!(config.engine_socket.as_deref(), Some("unix:///tmp/engine.sock"));
    assert!(config.namespace.is_none());
    assert!(config.timeout_secs.is_none());
}

#[rstest]
fn app_config_rejects_non_integer_timeout() {
    let error = toml::from_str::<AppConfig>(r#"timeout_secs = "soon""#)
        .expect_err("TOML parsing should fail for a non-integer timeout");
    assert!(
        error.to_string().contains("timeout_secs"),
        "Expected error mentioning timeout_secs, got: {error}"
    );
}

// ============================================================================
// Layer Precedence Tests (MergeComposer)
// ============================================================================

/// Test that serialised `AppConfig::default()` can round-trip through
/// `MergeComposer`.
///
/// This mirrors the production `load_config` behaviour, which serialises
/// `AppConfig::default()` as the defaults layer.
#[rstest]
fn layer_precedence_serialised_defaults_round_trip() {
    let composer = create_composer_with_defaults();
    let config = merge_config(composer);
    let expected = AppConfig::default();

    assert_eq!(config.engine_socket, expected.engine_socket);
    assert_eq!(config.namespace, expected.namespace);
    assert_eq!(config.timeout_secs, expected.timeout_secs);
}

/// Test that file layer overrides defaults.
#[rstest]
fn layer_precedence_file_overrides_defaults() {
    let mut composer = create_composer_with_defaults();
    composer.push_file(
        json!({
            "engine_socket": "unix:///from/file.sock",
            "namespace": "file-namespace"
        }),
        None,
    );

    let config = merge_config(composer);

    assert_eq!(
        config.engine_socket.as_deref(),
        Some("unix:///from/file.sock")
    );
    assert_eq!(config.namespace.as_deref(), Some("file-namespace"));
}

/// Test that environment layer overrides file layer.
#[rstest]
fn layer_precedence_env_overrides_file() {
    let mut composer = create_composer_with_defaults();
    composer.push_file(
        json!({
            "engine_socket": "unix:///from/file.sock",
            "namespace": "file-namespace"
        }),
        None,
    );
    composer.push_environment(json!({
        "engine_socket": "unix:///from/env.sock"
    }));

    let config = merge_config(composer);

    // Environment overrides file for engine_socket
    assert_eq!(
        config.engine_socket.as_deref(),
        Some("unix:///from/env.sock")
    );
    // File value preserved for namespace (not in env layer)
    assert_eq!(config.namespace.as_deref(), Some("file-namespace"));
}

/// Test full precedence chain: defaults < file < env < CLI.
#[rstest]
fn layer_precedence_full_chain() {
    let mut composer = create_composer_with_defaults();
    composer.push_file(
        json!({
            "engine_socket": "file-socket",
            "namespace": "file-namespace",
            "timeout_secs": 10
        }),
        None,
    );
    composer.push_environment(json!({
        "namespace": "env-namespace"
    }));
    composer.push_cli(json!({
        "engine_socket": "cli-socket"
    }));

    let config = merge_config(composer);

    // CLI wins for engine_socket
    assert_eq!(config.engine_socket.as_deref(), Some("cli-socket"));
    // Env wins for namespace
    assert_eq!(config.namespace.as_deref(), Some("env-namespace"));
    // File wins for timeout_secs (not overridden by higher layers)
    assert_eq!(config.timeout_secs, Some(10));
}

// ============================================================================
// Loader Tests (environment and file integration)
// ============================================================================

#[rstest]
#[serial]
fn load_config_reads_environment_variables() {
    clear_loader_env();
    // SAFETY: tests are serialised; no concurrent env access.
    unsafe {
        std::env::set_var("EDGED_NAMESPACE", "env-namespace");
        std::env::set_var("EDGED_TIMEOUT_SECS", "45");
    }

    let cli = Cli::parse_from(["edged", "ps"]);
    let config = load_config(&cli).expect("loading should succeed");
    clear_loader_env();

    assert_eq!(config.namespace.as_deref(), Some("env-namespace"));
    assert_eq!(config.timeout_secs, Some(45));
}

#[rstest]
#[serial]
fn load_config_rejects_invalid_timeout_env() {
    clear_loader_env();
    // SAFETY: tests are serialised; no concurrent env access.
    unsafe { std::env::set_var("EDGED_TIMEOUT_SECS", "soon") };

    let cli = Cli::parse_from(["edged", "ps"]);
    let result = load_config(&cli);
    clear_loader_env();

    let error = result.expect_err("loading should fail for a non-integer timeout");
    assert!(
        error.to_string().contains("EDGED_TIMEOUT_SECS"),
        "Expected error naming the variable, got: {error}"
    );
}

#[rstest]
#[serial]
fn load_config_cli_overrides_file() {
    clear_loader_env();
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "engine_socket = \"unix:///from/file.sock\"\nnamespace = \"file-namespace\"\n",
    )
    .expect("config file should be written");

    let path_str = path.to_str().expect("temp path should be UTF-8");
    let cli = Cli::parse_from([
        "edged",
        "--config",
        path_str,
        "--engine-socket",
        "unix:///from/cli.sock",
        "ps",
    ]);
    let config = load_config(&cli).expect("loading should succeed");

    assert_eq!(
        config.engine_socket.as_deref(),
        Some("unix:///from/cli.sock")
    );
    assert_eq!(config.namespace.as_deref(), Some("file-namespace"));
}

#[rstest]
#[serial]
fn load_config_normalises_empty_namespace() {
    clear_loader_env();
    // SAFETY: tests are serialised; no concurrent env access.
    unsafe { std::env::set_var("EDGED_NAMESPACE", "") };

    let cli = Cli::parse_from(["edged", "ps"]);
    let config = load_config(&cli).expect("loading should succeed");
    clear_loader_env();

    assert!(config.namespace.is_none());
    assert_eq!(config.namespace_or_default(), "default");
}

#[rstest]
fn env_var_names_cover_all_fields() {
    let names = env_var_names();
    assert!(names.contains(&"EDGED_ENGINE_SOCKET"));
    assert!(names.contains(&"EDGED_NAMESPACE"));
    assert!(names.contains(&"EDGED_TIMEOUT_SECS"));
}
