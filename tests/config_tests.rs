//! Configuration loading and registry validation tests

use pretty_assertions::assert_eq;
use rip_server::sampling::PolicyKind;
use rip_server::{RipError, ServerConfig};
use rstest::*;
use std::time::Duration;

mod common;
use common::{generic_config, GENERIC_TOML, PENDULUM_JSON};

#[rstest]
fn test_generic_config_defaults_to_periodic_sampler(generic_config: ServerConfig) {
    let policy = generic_config.registry.default_policy();
    assert_eq!(policy.name, "PeriodicSampler");
    assert_eq!(policy.first_sampling, Duration::from_secs(15));
    assert_eq!(policy.period, Duration::from_secs(2));
    assert_eq!(policy.kind, PolicyKind::Periodic);

    let on_delta = generic_config.registry.policy("PeriodicSendOnDelta").unwrap();
    assert_eq!(on_delta.kind, PolicyKind::SendOnDelta { delta: 2.0 });
}

#[test]
fn test_files_are_parsed_by_extension() {
    let dir = tempfile::tempdir().unwrap();

    let toml_path = dir.path().join("generic.toml");
    std::fs::write(&toml_path, GENERIC_TOML).unwrap();
    let generic = ServerConfig::load_from_file(&toml_path).unwrap();
    assert_eq!(generic.identity.name, "RIP Generic");

    let json_path = dir.path().join("pendulum.json");
    std::fs::write(&json_path, PENDULUM_JSON).unwrap();
    let pendulum = ServerConfig::load_from_file(&json_path).unwrap();
    assert_eq!(pendulum.server.address(), "lab.local:9000");
    assert_eq!(
        pendulum.registry.writable_names(),
        vec!["torque", "mode", "enabled"]
    );

    // JSON content behind a .toml name is a TOML error
    let mislabeled = dir.path().join("pendulum.toml");
    std::fs::write(&mislabeled, PENDULUM_JSON).unwrap();
    assert!(matches!(
        ServerConfig::load_from_file(&mislabeled),
        Err(RipError::Config(_))
    ));
}

#[rstest]
#[case::explicit(r#""default_sampling": "B", "#, "B")]
#[case::alphabetical_first("", "A")]
fn test_default_policy_resolution(#[case] default_line: &str, #[case] expected: &str) {
    let config = ServerConfig::from_json_str(&format!(
        r#"{{"control": {{"info": {{ {default_line}
            "sampling_methods": {{
                "B": {{"period": 3}},
                "A": {{"period": 4}}
            }}
        }}}}}}"#
    ))
    .unwrap();
    assert_eq!(config.registry.default_policy().name, expected);
}

#[test]
fn test_builtin_policy_without_catalog() {
    let config = ServerConfig::from_json_str("{}").unwrap();
    let policy = config.registry.default_policy();
    assert_eq!(policy.first_sampling, Duration::ZERO);
    assert_eq!(policy.period, Duration::from_secs(1));
    assert!(policy.is_always_periodic());
}

#[test]
fn test_builtin_time_readable() {
    let config = ServerConfig::from_json_str(r#"{"control": {"info": {"writables": [{"name": "u"}]}}}"#)
        .unwrap();
    let time = config.registry.lookup_readable("time").unwrap();
    assert_eq!(time.description, "Server time in seconds");
    assert_eq!(time.min, 0.0);
    assert_eq!(time.max, f64::INFINITY);
}

#[test]
fn test_empty_readables_list_is_kept_empty() {
    let config =
        ServerConfig::from_json_str(r#"{"control": {"info": {"readables": []}}}"#).unwrap();
    assert!(config.registry.readables().is_empty());
}

#[test]
fn test_fractional_seconds() {
    let config = ServerConfig::from_json_str(
        r#"{"control": {"info": {"sampling_methods": {"Fast": {"first_sampling": "0.5", "period": 0.25}}}}}"#,
    )
    .unwrap();
    let policy = config.registry.policy("Fast").unwrap();
    assert_eq!(policy.first_sampling, Duration::from_millis(500));
    assert_eq!(policy.period, Duration::from_millis(250));
}

#[test]
fn test_readable_without_override_uses_default() {
    let config = ServerConfig::from_toml_str(GENERIC_TOML).unwrap();
    let time = config.registry.lookup_readable("time").unwrap();
    assert_eq!(config.registry.effective_policy(time).name, "PeriodicSampler");
}

#[test]
fn test_per_variable_params_override_catalog() {
    let config = ServerConfig::from_json_str(
        r#"{"control": {"info": {
            "sampling_methods": {"OnChange": {"period": 1, "delta": 2}},
            "readables": [{"name": "x", "sampling": {"type": "OnChange", "params": {"delta": "0.5"}}}]
        }}}"#,
    )
    .unwrap();
    let x = config.registry.lookup_readable("x").unwrap();
    let policy = config.registry.effective_policy(x);
    assert_eq!(policy.name, "OnChange");
    assert_eq!(policy.kind, PolicyKind::SendOnDelta { delta: 0.5 });
}

#[rstest]
#[case::missing_name(r#"{"control": {"info": {"readables": [{"type": "float"}]}}}"#)]
#[case::duplicate_across_lists(
    r#"{"control": {"info": {"readables": [{"name": "x"}], "writables": [{"name": "x"}]}}}"#
)]
#[case::unknown_type(r#"{"control": {"info": {"readables": [{"name": "x", "type": "complex"}]}}}"#)]
#[case::inverted_bounds(r#"{"control": {"info": {"readables": [{"name": "x", "min": 2, "max": 1}]}}}"#)]
#[case::zero_period(r#"{"control": {"info": {"sampling_methods": {"P": {"period": 0}}}}}"#)]
#[case::missing_period(r#"{"control": {"info": {"sampling_methods": {"P": {"first_sampling": 1}}}}}"#)]
#[case::negative_delta(r#"{"control": {"info": {"sampling_methods": {"P": {"period": 1, "delta": -1}}}}}"#)]
#[case::undeclared_default(r#"{"control": {"info": {"default_sampling": "Nope"}}}"#)]
#[case::not_json("{control")]
fn test_invalid_documents_are_config_errors(#[case] document: &str) {
    let err = ServerConfig::from_json_str(document).unwrap_err();
    assert!(matches!(err, RipError::Config(_)), "unexpected error: {err}");
}
