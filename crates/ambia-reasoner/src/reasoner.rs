// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reasoner: reads a user's recent activity, asks the pattern model what
//! they are likely to need next, and turns the answer into candidates.

use std::sync::Arc;
use std::time::Instant;

use ambia_config::model::AmbiaConfig;
use ambia_core::clock::{days, mins};
use ambia_core::types::{
    CandidatePrediction, ContextSnapshot, DecisionType, PatternObservation, ReasoningDecision,
    Urgency,
};
use ambia_core::{
    ActivitySummary, AmbiaError, Clock, PatternModel, PatternRequest, PluginAdapter, StorageAdapter,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info};

use crate::candidates::{CandidatePolicy, build_candidates, urgency};

/// Tunables for one reasoner instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonerSettings {
    pub policy: CandidatePolicy,
    pub activity_lookback: Duration,
    pub activity_limit: usize,
    pub max_recent_queries: usize,
    /// Weight of a new observation in the pattern confidence average.
    pub confidence_alpha: f64,
}

impl ReasonerSettings {
    pub fn from_config(config: &AmbiaConfig) -> Self {
        let reasoner = &config.reasoner;
        Self {
            policy: CandidatePolicy {
                detect_threshold: config.thresholds.detect,
                default_lead: mins(reasoner.default_lead_mins),
                job_validity: mins(reasoner.job_validity_mins),
                imminent_window: mins(reasoner.imminent_window_mins),
            },
            activity_lookback: days(reasoner.activity_lookback_days),
            activity_limit: reasoner.activity_limit,
            max_recent_queries: config.generator.max_recent_queries,
            confidence_alpha: reasoner.confidence_alpha,
        }
    }
}

impl Default for ReasonerSettings {
    fn default() -> Self {
        Self::from_config(&AmbiaConfig::default())
    }
}

/// Outcome of one [`Reasoner::reason`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reasoning {
    /// Highest confidence first.
    pub candidates: Vec<CandidatePrediction>,
    /// The audit row, absent when the user had no activity to reason over.
    pub decision: Option<ReasoningDecision>,
}

impl Reasoning {
    fn idle() -> Self {
        Self {
            candidates: Vec::new(),
            decision: None,
        }
    }

    /// The recommended action for the user right now.
    pub fn decision_type(&self) -> DecisionType {
        self.decision
            .as_ref()
            .map_or(DecisionType::Ignore, |d| d.decision_type)
    }
}

pub struct Reasoner {
    storage: Arc<dyn StorageAdapter>,
    model: Arc<dyn PatternModel>,
    clock: Arc<dyn Clock>,
    settings: ReasonerSettings,
}

impl Reasoner {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        model: Arc<dyn PatternModel>,
        clock: Arc<dyn Clock>,
        settings: ReasonerSettings,
    ) -> Self {
        Self {
            storage,
            model,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &ReasonerSettings {
        &self.settings
    }

    /// Produces scored candidates for `user_id`, updating the behaviour-pattern
    /// aggregate and appending an audit row along the way.
    ///
    /// Model failures come back as [`AmbiaError::Reasoner`].
    pub async fn reason(&self, user_id: &str) -> Result<Reasoning, AmbiaError> {
        let started = Instant::now();
        let now = self.clock.now();

        let activity = self
            .storage
            .recent_activity(
                user_id,
                now - self.settings.activity_lookback,
                self.settings.activity_limit,
            )
            .await?;
        if activity.is_empty() {
            debug!(user_id, "no recent activity, nothing to reason about");
            return Ok(Reasoning::idle());
        }

        let snapshot = self.current_snapshot(user_id, now).await?;
        let request = PatternRequest {
            user_id: user_id.to_string(),
            summary: ActivitySummary::from_records(&activity, self.settings.max_recent_queries),
            snapshot: snapshot.clone(),
            min_confidence: self.settings.policy.detect_threshold,
        };

        let detected = self.model.detect(&request).await.map_err(|e| match e {
            AmbiaError::Reasoner { .. } => e,
            other => AmbiaError::Reasoner {
                message: format!("pattern model {} failed", self.model.name()),
                source: Some(Box::new(other)),
            },
        })?;
        let candidates = build_candidates(user_id, &detected, now, &self.settings.policy);

        for candidate in &candidates {
            let observation = PatternObservation {
                user_id: user_id.to_string(),
                pattern_type: candidate.pattern_type,
                pattern_name: candidate.trigger_pattern.clone(),
                conditions: json!({
                    "predicted_action": candidate.predicted_need,
                    "predicted_query": candidate.predicted_query,
                    "trigger_time": candidate.scheduled_for,
                    "reasoning": candidate.reasoning,
                }),
                confidence: candidate.confidence,
            };
            self.storage
                .observe_pattern(&observation, self.settings.confidence_alpha, now)
                .await?;
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let decision = audit_row(user_id, &snapshot, &candidates, detected.len(), now, elapsed_ms);
        self.storage.record_decision(&decision).await?;

        info!(
            user_id,
            detected = detected.len(),
            candidates = candidates.len(),
            decision = %decision.decision_type,
            "reasoning complete"
        );
        Ok(Reasoning {
            candidates,
            decision: Some(decision),
        })
    }

    /// Time fields come from the clock; events and location from the last
    /// stored snapshot, if any.
    async fn current_snapshot(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ContextSnapshot, AmbiaError> {
        let mut snapshot = ContextSnapshot::from_clock(user_id, now);
        if let Some(stored) = self.storage.latest_snapshot(user_id).await? {
            snapshot.upcoming_events = stored
                .upcoming_events
                .into_iter()
                .filter(|e| e.starts_at >= now)
                .collect();
            snapshot.location_class = stored.location_class;
        }
        Ok(snapshot)
    }
}

fn audit_row(
    user_id: &str,
    snapshot: &ContextSnapshot,
    candidates: &[CandidatePrediction],
    detected: usize,
    now: DateTime<Utc>,
    duration_ms: u64,
) -> ReasoningDecision {
    let (decision_type, priority, urgency_level, reasoning) = match candidates.first() {
        Some(top) => (
            top.decision,
            top.priority(),
            urgency(top.scheduled_for, now),
            format!("{}: {}", top.predicted_need, top.reasoning),
        ),
        None => (
            DecisionType::Ignore,
            0,
            Urgency::Low,
            format!("{detected} detection(s), none above the confidence floor"),
        ),
    };

    ReasoningDecision {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        context_snapshot: serde_json::to_value(snapshot).unwrap_or_default(),
        decision_type,
        priority,
        urgency: urgency_level,
        reasoning,
        candidate_count: u32::try_from(candidates.len()).unwrap_or(u32::MAX),
        duration_ms,
        created_at: now,
    }
}
