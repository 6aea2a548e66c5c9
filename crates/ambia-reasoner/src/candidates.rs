// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning detected patterns into scored candidate predictions.
//!
//! Everything here is a pure function of its inputs so the threshold and
//! scheduling rules can be tested without storage or a model.

use ambia_core::DetectedPattern;
use ambia_core::types::{CandidatePrediction, DecisionType, Urgency};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

/// Longest pattern name kept in the behaviour-pattern table.
const MAX_PATTERN_NAME_LEN: usize = 64;

/// Scheduling and filtering rules applied to model output.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePolicy {
    /// Detections below this confidence are dropped.
    pub detect_threshold: f64,
    /// Lead time used when the model gives no trigger time.
    pub default_lead: Duration,
    /// How long after `scheduled_for` a candidate stays worth generating.
    pub job_validity: Duration,
    /// Triggers within this window of now are `show_now`.
    pub imminent_window: Duration,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self {
            detect_threshold: 0.6,
            default_lead: Duration::minutes(30),
            job_validity: Duration::hours(1),
            imminent_window: Duration::minutes(15),
        }
    }
}

/// Builds candidates from `detected`, dropping anything under the detect
/// threshold and detections with an empty action. Confidences are clamped
/// to `[0, 1]`; output is sorted by confidence, highest first.
pub fn build_candidates(
    user_id: &str,
    detected: &[DetectedPattern],
    now: DateTime<Utc>,
    policy: &CandidatePolicy,
) -> Vec<CandidatePrediction> {
    let mut candidates: Vec<CandidatePrediction> = detected
        .iter()
        .filter(|p| p.confidence.is_finite())
        .filter(|p| p.confidence >= policy.detect_threshold)
        .filter(|p| !p.predicted_action.trim().is_empty())
        .map(|p| candidate_from(user_id, p, now, policy))
        .collect();

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates
}

fn candidate_from(
    user_id: &str,
    pattern: &DetectedPattern,
    now: DateTime<Utc>,
    policy: &CandidatePolicy,
) -> CandidatePrediction {
    let confidence = pattern.confidence.clamp(0.0, 1.0);
    let predicted_need = pattern.predicted_action.trim().to_string();
    let predicted_query = pattern
        .predicted_query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(&predicted_need)
        .to_string();
    let trigger_pattern = pattern_name(&predicted_need);
    let scheduled_for = pattern.trigger_time.unwrap_or(now + policy.default_lead);
    let valid_until = scheduled_for + policy.job_validity;

    let decision = pattern.decision.unwrap_or(if scheduled_for <= now + policy.imminent_window {
        DecisionType::ShowNow
    } else {
        DecisionType::ShowLater
    });
    let reasoning = pattern.reasoning.clone().unwrap_or_default();

    CandidatePrediction {
        user_id: user_id.to_string(),
        generation_context: json!({
            "pattern_type": pattern.pattern_type.to_string(),
            "pattern_name": trigger_pattern,
            "predicted_action": predicted_need,
            "predicted_query": predicted_query,
            "confidence": confidence,
            "reasoning": reasoning,
        }),
        predicted_need,
        predicted_query,
        trigger_pattern,
        pattern_type: pattern.pattern_type,
        decision,
        scheduled_for,
        valid_until,
        confidence,
        reasoning,
    }
}

/// Stable identifier for a predicted action: lowercase ASCII alphanumerics
/// separated by single underscores.
pub fn pattern_name(action: &str) -> String {
    let mut name = String::with_capacity(action.len());
    for c in action.trim().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.is_empty() && !name.ends_with('_') {
            name.push('_');
        }
        if name.len() >= MAX_PATTERN_NAME_LEN {
            break;
        }
    }
    let trimmed = name.trim_end_matches('_');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// How soon a trigger at `scheduled_for` needs acting on.
pub fn urgency(scheduled_for: DateTime<Utc>, now: DateTime<Utc>) -> Urgency {
    let lead = scheduled_for - now;
    if lead <= Duration::zero() {
        Urgency::Critical
    } else if lead <= Duration::minutes(15) {
        Urgency::High
    } else if lead <= Duration::hours(2) {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambia_core::types::PatternType;
    use ambia_test_utils::detected;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    #[test]
    fn detections_below_threshold_are_dropped() {
        let patterns = vec![
            detected("check weather", None, 0.59, None),
            detected("check calendar", None, 0.6, None),
            detected("read news", None, 0.95, None),
        ];
        let candidates = build_candidates("u1", &patterns, now(), &CandidatePolicy::default());
        let needs: Vec<_> = candidates.iter().map(|c| c.predicted_need.as_str()).collect();
        assert_eq!(needs, vec!["read news", "check calendar"]);
    }

    #[test]
    fn default_schedule_and_decision() {
        let policy = CandidatePolicy::default();
        let candidates = build_candidates(
            "u1",
            &[detected("User will ask about movies", None, 0.8, None)],
            now(),
            &policy,
        );
        let c = &candidates[0];
        assert_eq!(c.scheduled_for, now() + Duration::minutes(30));
        assert_eq!(c.valid_until, now() + Duration::minutes(90));
        assert_eq!(c.decision, DecisionType::ShowLater);
        assert_eq!(c.predicted_query, "User will ask about movies");
        assert_eq!(c.trigger_pattern, "user_will_ask_about_movies");
        assert_eq!(c.priority(), 80);
    }

    #[test]
    fn imminent_triggers_show_now_and_model_decision_wins() {
        let policy = CandidatePolicy::default();
        let soon = now() + Duration::minutes(10);
        let mut explicit = detected("commute", Some("traffic to work"), 0.9, Some(soon));
        explicit.decision = Some(DecisionType::Cache);

        let candidates = build_candidates(
            "u1",
            &[detected("weather", None, 0.7, Some(soon)), explicit],
            now(),
            &policy,
        );
        assert_eq!(candidates[0].decision, DecisionType::Cache);
        assert_eq!(candidates[0].predicted_query, "traffic to work");
        assert_eq!(candidates[1].decision, DecisionType::ShowNow);
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let mut p = detected("news", None, 1.7, None);
        p.pattern_type = PatternType::QueryBased;
        let candidates = build_candidates("u1", &[p], now(), &CandidatePolicy::default());
        assert_eq!(candidates[0].confidence, 1.0);
        assert_eq!(candidates[0].priority(), 100);
    }

    #[test]
    fn pattern_names_are_slugs() {
        assert_eq!(pattern_name("  Morning Weather!! check "), "morning_weather_check");
        assert_eq!(pattern_name("???"), "unnamed");
    }

    #[test]
    fn urgency_follows_lead_time() {
        assert_eq!(urgency(now(), now()), Urgency::Critical);
        assert_eq!(urgency(now() + Duration::minutes(5), now()), Urgency::High);
        assert_eq!(urgency(now() + Duration::minutes(60), now()), Urgency::Medium);
        assert_eq!(urgency(now() + Duration::hours(5), now()), Urgency::Low);
    }

    #[test]
    fn urgency_boundaries_are_inclusive() {
        assert_eq!(urgency(now() - Duration::minutes(1), now()), Urgency::Critical);
        assert_eq!(urgency(now() + Duration::minutes(15), now()), Urgency::High);
        assert_eq!(urgency(now() + Duration::minutes(16), now()), Urgency::Medium);
        assert_eq!(urgency(now() + Duration::hours(2), now()), Urgency::Medium);
        assert_eq!(
            urgency(now() + Duration::hours(2) + Duration::minutes(1), now()),
            Urgency::Low
        );
    }

    proptest! {
        #[test]
        fn every_candidate_clears_the_floor(
            confidences in proptest::collection::vec(-0.5f64..1.5, 0..20),
            threshold in 0.0f64..1.0,
        ) {
            let patterns: Vec<_> = confidences
                .iter()
                .map(|c| detected("act", None, *c, None))
                .collect();
            let policy = CandidatePolicy { detect_threshold: threshold, ..Default::default() };
            let candidates = build_candidates("u1", &patterns, now(), &policy);
            let expected = confidences.iter().filter(|c| **c >= threshold).count();
            prop_assert_eq!(candidates.len(), expected);
            for c in &candidates {
                prop_assert!(c.confidence >= threshold.min(1.0));
                prop_assert!((0.0..=1.0).contains(&c.confidence));
                prop_assert!(c.valid_until > c.scheduled_for);
            }
        }
    }
}
