use std::collections::HashMap;
use std::io::Write;

use tempfile::NamedTempFile;

use bpresolve::{ConfigError, EstimatePair, ResolverConfig};

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn file_values_override_defaults() {
    let file = write_config(
        r#"
[endpoints]
base_url = "https://bp.example.org/api/v1/"
timeout_secs = 5

[iteration]
rounds = 5
"#,
    );

    let config = ResolverConfig::from_file(file.path()).unwrap();
    assert_eq!(config.endpoints.timeout_secs, 5);
    assert_eq!(config.iteration.rounds, 5);
    assert_eq!(config.iteration.systolic_prior, 120.0);
    assert_eq!(
        config.endpoints.systolic_url(),
        "https://bp.example.org/api/v1/knn/predict/systolic"
    );
    assert_eq!(
        config.endpoints.diastolic_url(),
        "https://bp.example.org/api/v1/knn/predict/diastolic"
    );
}

#[test]
fn load_from_path_yields_settings() {
    let file = write_config(
        r#"
[iteration]
rounds = 4
systolic_prior = 130.0
diastolic_prior = 85.0
"#,
    );

    let config = ResolverConfig::load(Some(file.path())).unwrap();
    let settings = config.settings().unwrap();
    assert_eq!(settings.rounds(), 4);
    assert_eq!(settings.priors(), EstimatePair::new(130.0, 85.0));
}

#[test]
fn environment_overrides_file() {
    let file = write_config(
        r#"
[endpoints]
base_url = "http://file-host:8000/api/v1"

[iteration]
rounds = 2
"#,
    );
    let env: HashMap<&str, &str> = [
        ("BPRESOLVE_BASE_URL", "http://env-host:9000/api/v1"),
        ("BPRESOLVE_ROUNDS", "7"),
    ]
    .into_iter()
    .collect();

    let mut config = ResolverConfig::from_file(file.path()).unwrap();
    config
        .apply_env(|key| env.get(key).map(|v| (*v).to_string()))
        .unwrap();
    config.validate().unwrap();

    assert_eq!(config.endpoints.base_url, "http://env-host:9000/api/v1");
    assert_eq!(config.iteration.rounds, 7);
    assert_eq!(config.endpoints.timeout_secs, 30);
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = ResolverConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}

#[test]
fn unreadable_file_is_not_reported_as_missing() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[0xff, 0xfe, b'[', 0x80]).unwrap();
    file.flush().unwrap();

    let err = ResolverConfig::from_file(file.path()).unwrap_err();
    let ConfigError::ReadFailed { path, message } = &err else {
        panic!("expected read failure, got {err}");
    };
    assert_eq!(path, &file.path().display().to_string());
    assert!(!message.is_empty());
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_config("[iteration\nrounds = ");
    let err = ResolverConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn zero_rounds_in_file_fails_validation() {
    let file = write_config("[iteration]\nrounds = 0\n");
    let err = ResolverConfig::load(Some(file.path())).unwrap_err();
    let ConfigError::ValidationFailed { field, .. } = err else {
        panic!("expected validation failure");
    };
    assert_eq!(field, "iteration.rounds");
}

#[test]
fn written_config_reloads_identically() {
    let mut config = ResolverConfig::default();
    config.endpoints.base_url = "http://127.0.0.1:8123/api/v1".to_string();
    config.iteration.rounds = 6;

    let file = write_config(&config.to_toml().unwrap());
    let reloaded = ResolverConfig::from_file(file.path()).unwrap();
    assert_eq!(reloaded, config);
}
