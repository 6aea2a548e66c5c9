// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::AmbiaError;
use crate::traits::adapter::PluginAdapter;
use crate::traits::context::ContextSource;
use crate::types::{
    ActivityRecord, BehaviorPattern, CacheEntry, CachePut, CacheStats, ContextSnapshot,
    EnqueueOutcome, FailOutcome, Feedback, FeedbackTuning, Job, NewJob, PatternObservation,
    QueueStats, ReasoningDecision, SweepPolicy,
};

/// Durable state for the pipeline: the job queue, the result cache, learned
/// patterns, the activity log, reasoning audit rows and context snapshots.
///
/// Every state transition is a single conditional statement, so multiple
/// handles (or processes) on the same store stay consistent without locks.
/// Time is always passed in by the caller.
#[async_trait]
pub trait StorageAdapter: PluginAdapter + ContextSource {
    /// Opens the backend and applies migrations.
    async fn initialize(&self) -> Result<(), AmbiaError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), AmbiaError>;

    // --- Generation queue ---

    /// Inserts a job unless a `queued`/`processing`, un-expired job for the same
    /// `(user_id, predicted_need)` is scheduled within `dedup_window` of it.
    async fn enqueue_job(
        &self,
        job: &NewJob,
        now: DateTime<Utc>,
        dedup_window: Duration,
    ) -> Result<EnqueueOutcome, AmbiaError>;

    /// Atomically claims the best eligible job, or `None` if there is none
    /// (including when another worker won the race).
    async fn claim_job(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<Job>, AmbiaError>;

    /// `processing -> completed`. Returns false if the job was not processing
    /// or is no longer claimed by `worker_id`.
    async fn complete_job(
        &self,
        job_id: &str,
        worker_id: &str,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AmbiaError>;

    /// Records a failed attempt; re-queues or fails the job depending on the cap.
    /// `None` if the job was not processing under `worker_id`'s claim.
    async fn fail_job(
        &self,
        job_id: &str,
        worker_id: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FailOutcome>, AmbiaError>;

    /// Records a failed attempt and moves the job straight to `failed`.
    async fn fail_job_permanently(
        &self,
        job_id: &str,
        worker_id: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AmbiaError>;

    /// `queued -> cancelled`.
    async fn cancel_job(&self, job_id: &str, now: DateTime<Utc>) -> Result<bool, AmbiaError>;

    /// Cancels queued jobs whose validity window has closed. Returns the count.
    async fn expire_queued_jobs(&self, now: DateTime<Utc>) -> Result<u64, AmbiaError>;

    /// Treats processing jobs with an expired lease as failed attempts. Returns the count.
    async fn release_expired_leases(&self, now: DateTime<Utc>) -> Result<u64, AmbiaError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, AmbiaError>;

    async fn queue_stats(&self) -> Result<QueueStats, AmbiaError>;

    // --- Result cache ---

    /// Returns a valid entry and records the access, or `None` on a miss.
    async fn cache_get(
        &self,
        user_id: &str,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, AmbiaError>;

    /// Like [`cache_get`](Self::cache_get) without touching access tracking.
    async fn cache_peek(
        &self,
        user_id: &str,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, AmbiaError>;

    /// Idempotent upsert keyed by `(user_id, cache_key)`.
    async fn cache_put(
        &self,
        user_id: &str,
        cache_key: &str,
        entry: &CachePut,
        now: DateTime<Utc>,
    ) -> Result<(), AmbiaError>;

    async fn cache_invalidate(&self, user_id: &str, cache_key: &str) -> Result<bool, AmbiaError>;

    /// Stores feedback and applies the relevance adjustment. Returns the updated entry.
    async fn cache_record_feedback(
        &self,
        user_id: &str,
        cache_key: &str,
        feedback: Feedback,
        tuning: &FeedbackTuning,
    ) -> Result<Option<CacheEntry>, AmbiaError>;

    /// Deletes every entry matching the sweep policy. Returns the count.
    async fn cache_sweep(&self, policy: &SweepPolicy) -> Result<u64, AmbiaError>;

    async fn cache_stats(
        &self,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CacheStats, AmbiaError>;

    // --- Activity ---

    async fn record_activity(&self, record: &ActivityRecord) -> Result<(), AmbiaError>;

    /// Distinct users with activity at or after `since`.
    async fn recently_active_users(&self, since: DateTime<Utc>) -> Result<Vec<String>, AmbiaError>;

    // --- Behaviour patterns ---

    /// Upserts a pattern: occurrences + 1 and confidence moved toward the
    /// observation by `alpha`.
    async fn observe_pattern(
        &self,
        observation: &PatternObservation,
        alpha: f64,
        now: DateTime<Utc>,
    ) -> Result<(), AmbiaError>;

    /// Moves a pattern's success rate toward 1 or 0 by `alpha`.
    async fn record_pattern_outcome(
        &self,
        user_id: &str,
        pattern_name: &str,
        success: bool,
        alpha: f64,
        now: DateTime<Utc>,
    ) -> Result<bool, AmbiaError>;

    /// Highest `confidence_score * success_rate` first.
    async fn top_patterns(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<BehaviorPattern>, AmbiaError>;

    async fn get_pattern(
        &self,
        user_id: &str,
        pattern_name: &str,
    ) -> Result<Option<BehaviorPattern>, AmbiaError>;

    // --- Audit and context ---

    async fn record_decision(&self, decision: &ReasoningDecision) -> Result<(), AmbiaError>;

    /// Newest first.
    async fn recent_decisions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ReasoningDecision>, AmbiaError>;

    async fn record_snapshot(&self, snapshot: &ContextSnapshot) -> Result<(), AmbiaError>;
}
