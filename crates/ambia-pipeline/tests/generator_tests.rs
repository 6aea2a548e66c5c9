// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generator worker behaviour against a real SQLite queue.

use std::sync::Arc;

use ambia_config::model::AmbiaConfig;
use ambia_core::types::{
    CacheType, CandidatePrediction, DecisionType, JobStatus, PatternType,
};
use ambia_core::{Clock, StorageAdapter, fingerprint};
use ambia_pipeline::{Admission, Orchestrator, SweepReport};
use ambia_test_utils::{MockGenerator, MockPatternModel, MockReply, TestHarness};
use chrono::Duration;
use serde_json::json;

fn orchestrator(harness: &TestHarness, generator: Arc<MockGenerator>) -> Orchestrator {
    Orchestrator::from_config(
        &harness.config,
        harness.storage.clone(),
        Arc::new(MockPatternModel::new(Vec::new())),
        generator,
        harness.clock.clone(),
        "worker-test",
    )
}

fn candidate(harness: &TestHarness, query: &str, confidence: f64) -> CandidatePrediction {
    let now = harness.clock.now();
    CandidatePrediction {
        user_id: "u1".into(),
        predicted_need: format!("user will ask about {query}"),
        predicted_query: query.into(),
        trigger_pattern: format!("{query}_pattern"),
        pattern_type: PatternType::TimeBased,
        decision: DecisionType::ShowNow,
        scheduled_for: now,
        valid_until: now + Duration::hours(1),
        confidence,
        generation_context: json!({
            "pattern_name": format!("{query}_pattern"),
            "confidence": confidence,
        }),
        reasoning: "seen every morning".into(),
    }
}

async fn enqueue(orchestrator: &Orchestrator, candidate: &CandidatePrediction) -> String {
    match orchestrator.scheduler().enqueue(candidate).await.unwrap() {
        Admission::Queued(id) => id,
        other => panic!("expected a queued job, got {other:?}"),
    }
}

#[tokio::test]
async fn completed_job_lands_in_the_cache() {
    let harness = TestHarness::new().await.unwrap();
    let generator = Arc::new(MockGenerator::new());
    let orchestrator = orchestrator(&harness, generator.clone());
    harness
        .record_query("u1", "weather today", harness.clock.now() - Duration::hours(2))
        .await
        .unwrap();
    let job_id = enqueue(&orchestrator, &candidate(&harness, "weather today", 0.85)).await;

    let report = orchestrator.run_generation_sweep().await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            claimed: 1,
            completed: 1,
            retried: 0,
            failed: 0
        }
    );

    let key = fingerprint("u1", "weather today");
    let job = harness.storage.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.result_cache_key.as_deref(), Some(key.as_str()));

    let entry = harness
        .storage
        .cache_peek("u1", &key, harness.clock.now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.cache_type, CacheType::Prediction);
    assert_eq!(entry.payload.len(), 2);
    assert!((entry.relevance_score - 0.85).abs() < 1e-9);
    assert_eq!(entry.trigger_conditions["pattern_name"], "weather today_pattern");
    assert_eq!(entry.generation_cost_tokens, Some(42));
    assert_eq!(entry.access_count, 0);
    assert_eq!(entry.valid_until, harness.clock.now() + Duration::minutes(30));

    let request = &generator.requests().await[0];
    assert_eq!(request.context["recent_queries"], json!(["weather today"]));
    assert_eq!(request.context["pattern"]["confidence"], json!(0.85));
    assert!(request.prompt.contains("user will ask about weather today"));
}

#[tokio::test(start_paused = true)]
async fn two_timeouts_then_success_completes_with_two_attempts() {
    let harness = TestHarness::new().await.unwrap();
    let generator = Arc::new(MockGenerator::with_replies(vec![
        MockReply::Hang,
        MockReply::Hang,
    ]));
    let orchestrator = orchestrator(&harness, generator.clone());
    let job_id = enqueue(&orchestrator, &candidate(&harness, "news", 0.9)).await;

    let report = orchestrator.run_generation_sweep().await.unwrap();
    assert_eq!(report.claimed, 3);
    assert_eq!(report.retried, 2);
    assert_eq!(report.completed, 1);
    assert_eq!(generator.calls(), 3);

    let job = harness.storage.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 2);
}

#[tokio::test]
async fn schema_violations_are_retried_then_fail() {
    let harness = TestHarness::new().await.unwrap();
    let bad = MockReply::Document(json!([{"type": "map", "data": {}}]));
    let generator = Arc::new(MockGenerator::with_replies(vec![
        bad.clone(),
        bad.clone(),
        bad,
    ]));
    let orchestrator = orchestrator(&harness, generator);
    let job_id = enqueue(&orchestrator, &candidate(&harness, "sports", 0.8)).await;

    let report = orchestrator.run_generation_sweep().await.unwrap();
    assert_eq!(report.retried, 2);
    assert_eq!(report.failed, 1);

    let job = harness.storage.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, job.max_attempts);
    assert!(
        job.error_message
            .unwrap()
            .starts_with("schema validation error")
    );
    let key = fingerprint("u1", "sports");
    assert!(
        harness
            .storage
            .cache_peek("u1", &key, harness.clock.now())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn permanent_errors_fail_on_first_attempt() {
    let harness = TestHarness::new().await.unwrap();
    let generator = Arc::new(MockGenerator::with_replies(vec![MockReply::Permanent(
        "user deleted".into(),
    )]));
    let orchestrator = orchestrator(&harness, generator.clone());
    let job_id = enqueue(&orchestrator, &candidate(&harness, "books", 0.8)).await;

    let report = orchestrator.run_generation_sweep().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(generator.calls(), 1);
    let job = harness.storage.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
}

#[tokio::test]
async fn sweep_is_bounded_and_claims_by_priority() {
    let mut config = AmbiaConfig::default();
    config.queue.jobs_per_sweep = 2;
    config.generator.prompt_template = Some("Build a page for {predicted_need} ({query})".into());
    let harness = TestHarness::with_config(config).await.unwrap();
    let generator = Arc::new(MockGenerator::new());
    let orchestrator = orchestrator(&harness, generator.clone());

    enqueue(&orchestrator, &candidate(&harness, "recipes", 0.71)).await;
    enqueue(&orchestrator, &candidate(&harness, "movies", 0.95)).await;
    enqueue(&orchestrator, &candidate(&harness, "calendar", 0.8)).await;

    let report = orchestrator.run_generation_sweep().await.unwrap();
    assert_eq!(report.claimed, 2);
    assert_eq!(report.completed, 2);
    assert_eq!(harness.storage.queue_stats().await.unwrap().queued, 1);

    let queries: Vec<String> = generator
        .requests()
        .await
        .into_iter()
        .map(|r| r.query)
        .collect();
    assert_eq!(queries, vec!["movies".to_string(), "calendar".to_string()]);
    assert_eq!(
        generator.requests().await[0].prompt,
        "Build a page for user will ask about movies (movies)"
    );
}

#[tokio::test]
async fn empty_queue_sweep_is_a_no_op() {
    let harness = TestHarness::new().await.unwrap();
    let generator = Arc::new(MockGenerator::new());
    let orchestrator = orchestrator(&harness, generator.clone());
    assert_eq!(
        orchestrator.run_generation_sweep().await.unwrap(),
        SweepReport::default()
    );
    assert_eq!(generator.calls(), 0);
}
