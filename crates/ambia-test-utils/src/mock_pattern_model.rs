// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock pattern model returning canned detections.

use std::sync::atomic::{AtomicUsize, Ordering};

use ambia_core::types::{AdapterType, HealthStatus, PatternType};
use ambia_core::{AmbiaError, DetectedPattern, PatternModel, PatternRequest, PluginAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// Returns the same detections on every call, or fails when built with
/// [`MockPatternModel::failing`].
pub struct MockPatternModel {
    patterns: Vec<DetectedPattern>,
    failure: Option<String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<PatternRequest>>,
}

impl MockPatternModel {
    pub fn new(patterns: Vec<DetectedPattern>) -> Self {
        Self {
            patterns,
            failure: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn last_request(&self) -> Option<PatternRequest> {
        self.last_request.lock().await.clone()
    }
}

/// A time-based detection with the given action, query, confidence and trigger.
pub fn detected(
    action: &str,
    query: Option<&str>,
    confidence: f64,
    trigger_time: Option<DateTime<Utc>>,
) -> DetectedPattern {
    DetectedPattern {
        pattern_type: PatternType::TimeBased,
        confidence,
        predicted_action: action.to_string(),
        predicted_query: query.map(str::to_string),
        trigger_time,
        reasoning: Some(format!("user repeatedly does: {action}")),
        decision: None,
    }
}

#[async_trait]
impl PluginAdapter for MockPatternModel {
    fn name(&self) -> &str {
        "mock-pattern-model"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PatternModel
    }

    async fn health_check(&self) -> Result<HealthStatus, AmbiaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AmbiaError> {
        Ok(())
    }
}

#[async_trait]
impl PatternModel for MockPatternModel {
    async fn detect(&self, request: &PatternRequest) -> Result<Vec<DetectedPattern>, AmbiaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().await = Some(request.clone());
        match &self.failure {
            Some(message) => Err(AmbiaError::Reasoner {
                message: message.clone(),
                source: None,
            }),
            None => Ok(self.patterns.clone()),
        }
    }
}
