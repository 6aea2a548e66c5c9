// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation scheduler: admission of candidates into the durable queue and
//! the claim/complete/fail transitions workers drive.

use std::sync::Arc;

use ambia_config::model::{QueueConfig, ThresholdsConfig};
use ambia_core::clock::{mins, secs};
use ambia_core::types::{
    CandidatePrediction, EnqueueOutcome, FailOutcome, Job, JobType, NewJob, QueueStats,
};
use ambia_core::{AmbiaError, Clock, StorageAdapter, fingerprint};
use chrono::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// Candidates below this confidence are not queued.
    pub queue_threshold: f64,
    pub max_attempts: u32,
    pub dedup_window: Duration,
    /// How long a claim is held before the job counts as abandoned.
    pub lease: Duration,
}

impl QueueSettings {
    pub fn from_config(queue: &QueueConfig, thresholds: &ThresholdsConfig) -> Self {
        Self {
            queue_threshold: thresholds.queue,
            max_attempts: queue.max_attempts,
            dedup_window: mins(queue.dedup_window_mins),
            lease: secs(queue.lease_secs),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default(), &ThresholdsConfig::default())
    }
}

/// What happened to a candidate offered to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Queued(String),
    BelowThreshold,
    /// An equivalent job is already queued or running.
    Duplicate,
    /// A valid page for the candidate's query is already cached.
    AlreadyCached,
}

pub struct GenerationScheduler {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    settings: QueueSettings,
}

impl GenerationScheduler {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            storage,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Offers a candidate to the queue. Skips are not errors.
    pub async fn enqueue(&self, candidate: &CandidatePrediction) -> Result<Admission, AmbiaError> {
        let user_id = candidate.user_id.as_str();
        if candidate.confidence < self.settings.queue_threshold {
            debug!(
                user_id,
                need = %candidate.predicted_need,
                confidence = candidate.confidence,
                "below queue threshold"
            );
            return Ok(Admission::BelowThreshold);
        }

        let now = self.clock.now();
        let cache_key = fingerprint(user_id, &candidate.predicted_query);
        if self
            .storage
            .cache_peek(user_id, &cache_key, now)
            .await?
            .is_some()
        {
            debug!(user_id, cache_key, "prediction already cached");
            return Ok(Admission::AlreadyCached);
        }

        let job = NewJob {
            user_id: user_id.to_string(),
            job_type: JobType::Prediction,
            priority: candidate.priority(),
            predicted_need: candidate.predicted_need.clone(),
            source_query: candidate.predicted_query.clone(),
            generation_context: candidate.generation_context.clone(),
            prompt_template: None,
            scheduled_for: candidate.scheduled_for,
            valid_until: candidate.valid_until,
            max_attempts: self.settings.max_attempts,
        };
        match self
            .storage
            .enqueue_job(&job, now, self.settings.dedup_window)
            .await?
        {
            EnqueueOutcome::Queued(id) => {
                info!(
                    user_id,
                    job_id = %id,
                    priority = job.priority,
                    scheduled_for = %job.scheduled_for,
                    "prediction queued"
                );
                Ok(Admission::Queued(id))
            }
            EnqueueOutcome::Duplicate => {
                debug!(user_id, need = %job.predicted_need, "prediction already queued");
                Ok(Admission::Duplicate)
            }
        }
    }

    /// Claims the next eligible job. `None` means nothing to do or a lost race.
    pub async fn claim(&self, worker_id: &str) -> Result<Option<Job>, AmbiaError> {
        self.storage
            .claim_job(worker_id, self.clock.now(), self.settings.lease)
            .await
    }

    /// Completes a job claimed by `worker_id`. False if the claim was lost.
    pub async fn complete(
        &self,
        job_id: &str,
        worker_id: &str,
        cache_key: &str,
    ) -> Result<bool, AmbiaError> {
        self.storage
            .complete_job(job_id, worker_id, cache_key, self.clock.now())
            .await
    }

    /// Records `error` against a claimed job. Retryable errors go back to the
    /// queue until the attempt cap; anything else fails the job outright.
    /// `None` if the job was no longer processing under `worker_id`.
    pub async fn fail(
        &self,
        job: &Job,
        worker_id: &str,
        error: &AmbiaError,
    ) -> Result<Option<FailOutcome>, AmbiaError> {
        let message = error.truncated_message();
        let now = self.clock.now();
        let outcome = if error.is_retryable() {
            self.storage.fail_job(&job.id, worker_id, &message, now).await?
        } else {
            self.storage
                .fail_job_permanently(&job.id, worker_id, &message, now)
                .await?
                .then_some(FailOutcome::Failed {
                    attempts: job.attempts.saturating_add(1),
                })
        };

        match outcome {
            Some(FailOutcome::Requeued { attempts }) => {
                warn!(job_id = %job.id, attempts, error = %message, "job failed, re-queued");
            }
            Some(FailOutcome::Failed { attempts }) => {
                warn!(job_id = %job.id, attempts, error = %message, "job failed permanently");
            }
            None => {
                warn!(job_id = %job.id, worker_id, "job claim was lost before it failed");
            }
        }
        Ok(outcome)
    }

    pub async fn cancel(&self, job_id: &str) -> Result<bool, AmbiaError> {
        self.storage.cancel_job(job_id, self.clock.now()).await
    }

    pub async fn expire_queued(&self) -> Result<u64, AmbiaError> {
        self.storage.expire_queued_jobs(self.clock.now()).await
    }

    pub async fn release_expired_leases(&self) -> Result<u64, AmbiaError> {
        self.storage.release_expired_leases(self.clock.now()).await
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<Job>, AmbiaError> {
        self.storage.get_job(job_id).await
    }

    pub async fn stats(&self) -> Result<QueueStats, AmbiaError> {
        self.storage.queue_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambia_core::types::{CacheType, CachePut, DecisionType, JobStatus, PatternType};
    use ambia_core::parse_document;
    use ambia_test_utils::{TestHarness, sample_document};
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use tracing_test::traced_test;

    fn scheduler(harness: &TestHarness) -> GenerationScheduler {
        GenerationScheduler::new(
            harness.storage.clone(),
            harness.clock.clone(),
            QueueSettings::from_config(&harness.config.queue, &harness.config.thresholds),
        )
    }

    fn candidate(query: &str, confidence: f64, at: DateTime<Utc>) -> CandidatePrediction {
        CandidatePrediction {
            user_id: "u1".into(),
            predicted_need: format!("{query} need"),
            predicted_query: query.into(),
            trigger_pattern: "p".into(),
            pattern_type: PatternType::TimeBased,
            decision: DecisionType::ShowLater,
            scheduled_for: at,
            valid_until: at + Duration::hours(1),
            confidence,
            generation_context: json!({"pattern_name": "p", "confidence": confidence}),
            reasoning: String::new(),
        }
    }

    #[tokio::test]
    async fn threshold_and_duplicates_gate_admission() {
        let harness = TestHarness::new().await.unwrap();
        let scheduler = scheduler(&harness);
        let now = harness.clock.now();

        assert_eq!(
            scheduler.enqueue(&candidate("news", 0.69, now)).await.unwrap(),
            Admission::BelowThreshold
        );
        let first = scheduler.enqueue(&candidate("news", 0.7, now)).await.unwrap();
        assert!(matches!(first, Admission::Queued(_)));
        assert_eq!(
            scheduler
                .enqueue(&candidate("news", 0.9, now + Duration::minutes(20)))
                .await
                .unwrap(),
            Admission::Duplicate
        );
        assert_eq!(scheduler.stats().await.unwrap().queued, 1);
    }

    #[tokio::test]
    async fn cached_queries_are_not_queued() {
        let harness = TestHarness::new().await.unwrap();
        let scheduler = scheduler(&harness);
        let now = harness.clock.now();
        harness
            .storage
            .cache_put(
                "u1",
                &fingerprint("u1", "Weather"),
                &CachePut {
                    cache_type: CacheType::Prediction,
                    source_query: "weather".into(),
                    payload: parse_document(&sample_document()).unwrap(),
                    relevance_score: 0.8,
                    trigger_conditions: json!({}),
                    valid_until: now + Duration::minutes(30),
                    generation_cost_tokens: None,
                    generation_time_ms: None,
                },
                now,
            )
            .await
            .unwrap();

        assert_eq!(
            scheduler.enqueue(&candidate("weather", 0.9, now)).await.unwrap(),
            Admission::AlreadyCached
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn permanent_errors_skip_retries() {
        let harness = TestHarness::new().await.unwrap();
        let scheduler = scheduler(&harness);
        let now = harness.clock.now();
        scheduler.enqueue(&candidate("books", 0.8, now)).await.unwrap();

        let job = scheduler.claim("w1").await.unwrap().unwrap();
        let outcome = scheduler
            .fail(
                &job,
                "w1",
                &AmbiaError::PermanentJob {
                    job_id: job.id.clone(),
                    reason: "user deleted".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, Some(FailOutcome::Failed { attempts: 1 }));

        let stored = scheduler.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.attempts, 1);
        assert!(scheduler.claim("w1").await.unwrap().is_none());
        assert!(logs_contain("job failed permanently"));
    }

    #[tokio::test]
    async fn retryable_errors_requeue_until_the_cap() {
        let harness = TestHarness::new().await.unwrap();
        let scheduler = scheduler(&harness);
        let now = harness.clock.now();
        scheduler.enqueue(&candidate("recipes", 0.8, now)).await.unwrap();

        let timeout = AmbiaError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let mut outcomes = Vec::new();
        while let Some(job) = scheduler.claim("w1").await.unwrap() {
            outcomes.push(scheduler.fail(&job, "w1", &timeout).await.unwrap().unwrap());
        }
        assert_eq!(
            outcomes,
            vec![
                FailOutcome::Requeued { attempts: 1 },
                FailOutcome::Requeued { attempts: 2 },
                FailOutcome::Failed { attempts: 3 },
            ]
        );
    }
}
