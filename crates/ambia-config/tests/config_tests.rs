// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use ambia_config::diagnostic::ConfigError;
use ambia_config::{load_and_validate_str, load_config, load_config_from_str};
use figment::Jail;
use serial_test::serial;

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "ambia-test"
log_level = "debug"
worker_id = "worker-a"

[storage]
database_path = "/tmp/ambia-test.db"
wal_mode = false

[thresholds]
detect = 0.5
queue = 0.75

[queue]
max_attempts = 4
dedup_window_mins = 20
lease_secs = 120
jobs_per_sweep = 3
batch_budget_secs = 60

[cache]
validity_mins = 45
eviction_floor = 0.2

[generator]
timeout_secs = 15
prompt_template = "Build a page for {predicted_need}"

[reasoner]
default_lead_mins = 10

[pregenerate]
top_n = 2

[cadence]
scan_secs = 60

[anthropic]
api_key = "sk-ant-test"
model = "claude-haiku"

[pattern_model]
base_url = "http://localhost:9999/v1"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "ambia-test");
    assert_eq!(config.service.worker_id.as_deref(), Some("worker-a"));
    assert!(!config.storage.wal_mode);
    assert_eq!(config.thresholds.detect, 0.5);
    assert_eq!(config.thresholds.queue, 0.75);
    assert_eq!(config.queue.max_attempts, 4);
    assert_eq!(config.queue.jobs_per_sweep, 3);
    assert_eq!(config.cache.validity_mins, 45);
    assert_eq!(config.cache.grace_period_mins, 60);
    assert_eq!(config.generator.timeout_secs, 15);
    assert_eq!(config.reasoner.default_lead_mins, 10);
    assert_eq!(config.reasoner.job_validity_mins, 60);
    assert_eq!(config.pregenerate.top_n, 2);
    assert_eq!(config.cadence.scan_secs, 60);
    assert_eq!(config.cadence.sweep_secs, 120);
    assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-ant-test"));
    assert_eq!(config.pattern_model.base_url, "http://localhost:9999/v1");
}

#[test]
fn typo_produces_unknown_key_with_suggestion() {
    let toml = "[queue]\nmax_atempts = 3\n";
    let errors = load_and_validate_str(toml).expect_err("typo must be rejected");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("an UnknownKey diagnostic");
    assert_eq!(unknown.0, "max_atempts");
    assert_eq!(unknown.1.as_deref(), Some("max_attempts"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[queue]\nmax_attempts = \"three\"\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. } | ConfigError::Other(_)))
    );
}

#[test]
fn semantic_errors_surface_after_parsing() {
    let errors = load_and_validate_str("[thresholds]\ndetect = 0.9\nqueue = 0.7\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn empty_input_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.thresholds.queue, 0.7);
}

#[test]
#[serial]
fn local_file_and_env_layer_in_order() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "ambia.toml",
            r#"
[queue]
max_attempts = 5
jobs_per_sweep = 7
"#,
        )?;
        jail.set_env("AMBIA_QUEUE_MAX_ATTEMPTS", "6");
        jail.set_env("AMBIA_PATTERN_MODEL_MODEL", "local-llama");

        let config = load_config()?;
        assert_eq!(config.queue.max_attempts, 6);
        assert_eq!(config.queue.jobs_per_sweep, 7);
        assert_eq!(config.pattern_model.model, "local-llama");
        Ok(())
    });
}
