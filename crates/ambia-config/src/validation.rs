// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Checks the semantic constraints serde cannot express. All errors are
//! collected; validation never stops at the first one.

use crate::diagnostic::ConfigError;
use crate::model::AmbiaConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for every configured duration. Windows are added to and
/// subtracted from timestamps, which must stay representable.
const MAX_DURATION_SECS: u64 = 366 * 86_400;

pub fn validate_config(config: &AmbiaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if let Some(worker_id) = &config.service.worker_id
        && worker_id.trim().is_empty()
    {
        fail("service.worker_id must not be blank when set".to_string());
    }

    for (name, value) in [
        ("thresholds.detect", config.thresholds.detect),
        ("thresholds.queue", config.thresholds.queue),
        ("cache.eviction_floor", config.cache.eviction_floor),
        ("cache.helpful_boost", config.cache.helpful_boost),
    ] {
        if !(0.0..=1.0).contains(&value) {
            fail(format!("{name} must be between 0 and 1, got {value}"));
        }
    }

    if config.thresholds.queue < config.thresholds.detect {
        fail(format!(
            "thresholds.queue ({}) must not be lower than thresholds.detect ({})",
            config.thresholds.queue, config.thresholds.detect
        ));
    }

    for (name, value) in [
        ("cache.not_helpful_factor", config.cache.not_helpful_factor),
        ("cache.success_rate_alpha", config.cache.success_rate_alpha),
        ("reasoner.confidence_alpha", config.reasoner.confidence_alpha),
    ] {
        if !(value > 0.0 && value <= 1.0) {
            fail(format!("{name} must be in (0, 1], got {value}"));
        }
    }

    if config.queue.max_attempts == 0 {
        fail("queue.max_attempts must be at least 1".to_string());
    }

    for (name, value) in [
        ("queue.lease_secs", config.queue.lease_secs),
        ("queue.batch_budget_secs", config.queue.batch_budget_secs),
        ("cache.validity_mins", config.cache.validity_mins),
        ("generator.timeout_secs", config.generator.timeout_secs),
        ("reasoner.job_validity_mins", config.reasoner.job_validity_mins),
        ("cadence.scan_secs", config.cadence.scan_secs),
        ("cadence.sweep_secs", config.cadence.sweep_secs),
        ("cadence.pregenerate_secs", config.cadence.pregenerate_secs),
        ("cadence.maintain_secs", config.cadence.maintain_secs),
        ("pattern_model.timeout_secs", config.pattern_model.timeout_secs),
    ] {
        if value == 0 {
            fail(format!("{name} must be greater than zero"));
        }
    }

    for (name, value, unit_secs) in [
        ("queue.dedup_window_mins", config.queue.dedup_window_mins, 60),
        ("queue.lease_secs", config.queue.lease_secs, 1),
        ("queue.batch_budget_secs", config.queue.batch_budget_secs, 1),
        ("cache.validity_mins", config.cache.validity_mins, 60),
        ("cache.grace_period_mins", config.cache.grace_period_mins, 60),
        ("cache.stale_unused_hours", config.cache.stale_unused_hours, 3600),
        ("generator.timeout_secs", config.generator.timeout_secs, 1),
        ("generator.activity_lookback_days", config.generator.activity_lookback_days, 86_400),
        ("reasoner.activity_lookback_days", config.reasoner.activity_lookback_days, 86_400),
        ("reasoner.default_lead_mins", config.reasoner.default_lead_mins, 60),
        ("reasoner.job_validity_mins", config.reasoner.job_validity_mins, 60),
        ("reasoner.imminent_window_mins", config.reasoner.imminent_window_mins, 60),
        ("reasoner.active_user_window_days", config.reasoner.active_user_window_days, 86_400),
        ("cadence.scan_secs", config.cadence.scan_secs, 1),
        ("cadence.sweep_secs", config.cadence.sweep_secs, 1),
        ("cadence.pregenerate_secs", config.cadence.pregenerate_secs, 1),
        ("cadence.maintain_secs", config.cadence.maintain_secs, 1),
        ("pattern_model.timeout_secs", config.pattern_model.timeout_secs, 1),
    ] {
        let within = value
            .checked_mul(unit_secs)
            .is_some_and(|secs| secs <= MAX_DURATION_SECS);
        if !within {
            fail(format!("{name} ({value}) exceeds the 366 day limit"));
        }
    }

    if config.queue.jobs_per_sweep == 0 {
        fail("queue.jobs_per_sweep must be at least 1".to_string());
    }

    if config.queue.lease_secs < config.generator.timeout_secs {
        fail(format!(
            "queue.lease_secs ({}) must cover generator.timeout_secs ({})",
            config.queue.lease_secs, config.generator.timeout_secs
        ));
    }

    if let Some(template) = &config.generator.prompt_template
        && !template.contains("{predicted_need}")
        && !template.contains("{query}")
    {
        fail(
            "generator.prompt_template must reference {predicted_need} or {query}".to_string(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&AmbiaConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = AmbiaConfig::default();
        config.storage.database_path = " ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn out_of_range_thresholds_are_all_reported() {
        let mut config = AmbiaConfig::default();
        config.thresholds.detect = 1.5;
        config.thresholds.queue = -0.1;
        config.queue.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "thresholds.detect"));
        assert!(has_error(&errors, "thresholds.queue"));
        assert!(has_error(&errors, "max_attempts"));
    }

    #[test]
    fn queue_threshold_below_detect_threshold_is_rejected() {
        let mut config = AmbiaConfig::default();
        config.thresholds.detect = 0.8;
        config.thresholds.queue = 0.7;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "must not be lower"));
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let mut config = AmbiaConfig::default();
        config.cadence.sweep_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "cadence.sweep_secs"));
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let mut config = AmbiaConfig::default();
        config.cache.validity_mins = u64::MAX;
        config.reasoner.active_user_window_days = 400;
        config.cadence.maintain_secs = 366 * 86_400;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(has_error(&errors, "cache.validity_mins"));
        assert!(has_error(&errors, "reasoner.active_user_window_days"));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = AmbiaConfig::default();
        config.service.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "log_level"));
    }

    #[test]
    fn prompt_template_without_placeholders_is_rejected() {
        let mut config = AmbiaConfig::default();
        config.generator.prompt_template = Some("make something nice".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "prompt_template"));

        config.generator.prompt_template = Some("Build a page for {predicted_need}".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
