// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands. Each returns a serialisable report that `main`
//! prints as JSON.

use std::sync::Arc;

use ambia_core::clock::days;
use ambia_core::types::{
    ActivityRecord, BehaviorPattern, CacheStats, Feedback, QueueStats, ReasoningDecision,
};
use ambia_core::{AmbiaError, ContentGenerator, StorageAdapter};
use ambia_pipeline::{Orchestrator, PregenerateResult};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::App;

#[derive(Debug, Serialize)]
pub struct UserPregeneration {
    pub user_id: String,
    pub results: Vec<PregenerateResult>,
}

/// Pre-generates valuable pages for `user_id`, or for every recently active
/// user when `None`. A user whose patterns cannot be read is skipped.
pub async fn pregenerate(
    app: &App,
    orchestrator: &Orchestrator,
    content: &Arc<dyn ContentGenerator>,
    user_id: Option<&str>,
) -> Result<Vec<UserPregeneration>, AmbiaError> {
    let users = match user_id {
        Some(user) => vec![user.to_string()],
        None => {
            let since = app.clock.now() - days(app.config.reasoner.active_user_window_days);
            app.storage.recently_active_users(since).await?
        }
    };

    let mut report = Vec::with_capacity(users.len());
    for user_id in users {
        match orchestrator
            .pregenerate_valuable_pages(&user_id, content.as_ref())
            .await
        {
            Ok(results) => report.push(UserPregeneration { user_id, results }),
            Err(e) => warn!(user_id = %user_id, error = %e, "pre-generation skipped"),
        }
    }
    Ok(report)
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub queue: QueueStats,
    pub cache: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserStatus>,
}

#[derive(Debug, Serialize)]
pub struct UserStatus {
    pub user_id: String,
    pub top_patterns: Vec<BehaviorPattern>,
    pub recent_decisions: Vec<ReasoningDecision>,
}

pub async fn status(app: &App, user_id: Option<&str>) -> Result<StatusReport, AmbiaError> {
    let queue = app.storage.queue_stats().await?;
    let cache = app.cache().stats(user_id).await?;
    let user = match user_id {
        Some(user_id) => Some(UserStatus {
            user_id: user_id.to_string(),
            top_patterns: app
                .storage
                .top_patterns(user_id, app.config.pregenerate.top_n)
                .await?,
            recent_decisions: app.storage.recent_decisions(user_id, 10).await?,
        }),
        None => None,
    };
    Ok(StatusReport { queue, cache, user })
}

#[derive(Debug, Serialize)]
pub struct FeedbackReport {
    pub cache_key: String,
    pub feedback: Feedback,
    pub relevance_score: f64,
}

pub async fn feedback(
    app: &App,
    user_id: &str,
    cache_key: &str,
    feedback: Feedback,
) -> Result<FeedbackReport, AmbiaError> {
    let entry = app
        .cache()
        .record_feedback(user_id, cache_key, feedback)
        .await?
        .ok_or_else(|| {
            AmbiaError::Internal(format!("no cache entry {cache_key} for user {user_id}"))
        })?;
    Ok(FeedbackReport {
        cache_key: entry.cache_key,
        feedback,
        relevance_score: entry.relevance_score,
    })
}

pub async fn activity(
    app: &App,
    user_id: &str,
    action: &str,
    query: Option<String>,
    components_shown: Vec<String>,
) -> Result<ActivityRecord, AmbiaError> {
    let mut record = ActivityRecord::at(user_id, action, query, app.clock.now());
    record.components_shown = components_shown;
    app.storage.record_activity(&record).await?;
    info!(user_id, action, "activity recorded");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Models;
    use crate::test_support::temp_config;
    use ambia_core::types::{CachePut, CacheType};
    use ambia_core::{ManualClock, fingerprint, parse_document};
    use ambia_test_utils::{MockGenerator, default_start, sample_document};
    use serde_json::json;

    async fn app(dir: &tempfile::TempDir) -> App {
        App::open_with_clock(temp_config(dir), Arc::new(ManualClock::new(default_start())))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn activity_then_status() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app(&dir).await;
        let record = activity(&app, "u1", "query", Some("weather".into()), vec!["weather".into()])
            .await
            .unwrap();
        assert_eq!(record.components_shown, vec!["weather".to_string()]);

        let report = status(&app, Some("u1")).await.unwrap();
        assert_eq!(report.queue, QueueStats::default());
        assert_eq!(report.cache.entries, 0);
        let user = report.user.unwrap();
        assert!(user.top_patterns.is_empty());
        assert!(user.recent_decisions.is_empty());
    }

    #[tokio::test]
    async fn feedback_on_missing_entry_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app(&dir).await;
        assert!(feedback(&app, "u1", "0123456789abcdef", Feedback::Helpful).await.is_err());
    }

    #[tokio::test]
    async fn feedback_adjusts_relevance() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app(&dir).await;
        let key = fingerprint("u1", "news");
        app.cache()
            .put(
                "u1",
                &key,
                &CachePut {
                    cache_type: CacheType::FrequentQuery,
                    source_query: "news".into(),
                    payload: parse_document(&sample_document()).unwrap(),
                    relevance_score: 0.5,
                    trigger_conditions: json!({}),
                    valid_until: app.clock.now() + chrono::Duration::minutes(30),
                    generation_cost_tokens: None,
                    generation_time_ms: None,
                },
            )
            .await
            .unwrap();

        let report = feedback(&app, "u1", &key, Feedback::NotHelpful).await.unwrap();
        assert!((report.relevance_score - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pregenerate_covers_active_users() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app(&dir).await;
        activity(&app, "u1", "query", Some("news".into()), Vec::new())
            .await
            .unwrap();
        let orchestrator = app.orchestrator(Models::NotNeeded).unwrap();
        let content: Arc<dyn ContentGenerator> = Arc::new(MockGenerator::new());

        let report = pregenerate(&app, &orchestrator, &content, None).await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].user_id, "u1");
        assert!(report[0].results.is_empty());
    }
}
