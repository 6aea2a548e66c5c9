// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The black-box pattern scoring model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivitySummary;
use crate::error::AmbiaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ContextSnapshot, DecisionType, PatternType};

/// Input to [`PatternModel::detect`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternRequest {
    pub user_id: String,
    pub summary: ActivitySummary,
    pub snapshot: ContextSnapshot,
    /// Patterns below this confidence are not wanted. Models may ignore it.
    pub min_confidence: f64,
}

/// One pattern reported by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub predicted_action: String,
    #[serde(default)]
    pub predicted_query: Option<String>,
    #[serde(default)]
    pub trigger_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub decision: Option<DecisionType>,
}

/// Scores a user's behaviour into candidate patterns.
#[async_trait]
pub trait PatternModel: PluginAdapter {
    async fn detect(&self, request: &PatternRequest) -> Result<Vec<DetectedPattern>, AmbiaError>;
}
