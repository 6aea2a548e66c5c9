// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`StorageAdapter`].

use ambia_config::model::StorageConfig;
use ambia_core::types::{
    ActivityRecord, BehaviorPattern, CacheEntry, CachePut, CacheStats, ContextSnapshot,
    EnqueueOutcome, FailOutcome, Feedback, FeedbackTuning, Job, NewJob, PatternObservation,
    QueueStats, ReasoningDecision, SweepPolicy,
};
use ambia_core::{AdapterType, AmbiaError, ContextSource, HealthStatus, PluginAdapter, StorageAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage. The database is opened by
/// [`StorageAdapter::initialize`]; every other call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Opens and initializes storage at `path` with WAL enabled.
    pub async fn open(path: &str) -> Result<Self, AmbiaError> {
        let storage = Self::new(StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        });
        storage.initialize().await?;
        Ok(storage)
    }

    fn db(&self) -> Result<&Database, AmbiaError> {
        self.db.get().ok_or_else(|| {
            AmbiaError::storage(std::io::Error::other(
                "storage not initialized, call initialize() first",
            ))
        })
    }

    async fn checkpoint(&self) -> Result<(), AmbiaError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                })
                .await
                .map_err(map_tr_err)?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, AmbiaError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AmbiaError> {
        self.checkpoint().await
    }
}

#[async_trait]
impl ContextSource for SqliteStorage {
    async fn recent_activity(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, AmbiaError> {
        queries::activity::recent(self.db()?, user_id, since, limit).await
    }

    async fn latest_snapshot(
        &self,
        user_id: &str,
    ) -> Result<Option<ContextSnapshot>, AmbiaError> {
        queries::activity::latest_snapshot(self.db()?, user_id).await
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), AmbiaError> {
        let path = &self.config.database_path;
        let db = Database::open_with(path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| {
            AmbiaError::storage(std::io::Error::other("storage already initialized"))
        })?;
        debug!(path = %path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), AmbiaError> {
        self.db()?;
        self.checkpoint().await
    }

    // --- Generation queue ---

    async fn enqueue_job(
        &self,
        job: &NewJob,
        now: DateTime<Utc>,
        dedup_window: Duration,
    ) -> Result<EnqueueOutcome, AmbiaError> {
        queries::queue::enqueue(self.db()?, job, now, dedup_window).await
    }

    async fn claim_job(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<Job>, AmbiaError> {
        queries::queue::claim(self.db()?, worker_id, now, lease).await
    }

    async fn complete_job(
        &self,
        job_id: &str,
        worker_id: &str,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AmbiaError> {
        queries::queue::complete(self.db()?, job_id, worker_id, cache_key, now).await
    }

    async fn fail_job(
        &self,
        job_id: &str,
        worker_id: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FailOutcome>, AmbiaError> {
        queries::queue::fail(self.db()?, job_id, worker_id, error_message, now).await
    }

    async fn fail_job_permanently(
        &self,
        job_id: &str,
        worker_id: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AmbiaError> {
        queries::queue::fail_permanently(self.db()?, job_id, worker_id, error_message, now)
            .await
    }

    async fn cancel_job(&self, job_id: &str, now: DateTime<Utc>) -> Result<bool, AmbiaError> {
        queries::queue::cancel(self.db()?, job_id, now).await
    }

    async fn expire_queued_jobs(&self, now: DateTime<Utc>) -> Result<u64, AmbiaError> {
        queries::queue::expire_queued(self.db()?, now).await
    }

    async fn release_expired_leases(&self, now: DateTime<Utc>) -> Result<u64, AmbiaError> {
        queries::queue::release_expired_leases(self.db()?, now).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, AmbiaError> {
        queries::queue::get(self.db()?, job_id).await
    }

    async fn queue_stats(&self) -> Result<QueueStats, AmbiaError> {
        queries::queue::stats(self.db()?).await
    }

    // --- Result cache ---

    async fn cache_get(
        &self,
        user_id: &str,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, AmbiaError> {
        queries::cache::get(self.db()?, user_id, cache_key, now).await
    }

    async fn cache_peek(
        &self,
        user_id: &str,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, AmbiaError> {
        queries::cache::peek(self.db()?, user_id, cache_key, now).await
    }

    async fn cache_put(
        &self,
        user_id: &str,
        cache_key: &str,
        entry: &CachePut,
        now: DateTime<Utc>,
    ) -> Result<(), AmbiaError> {
        queries::cache::put(self.db()?, user_id, cache_key, entry, now).await
    }

    async fn cache_invalidate(&self, user_id: &str, cache_key: &str) -> Result<bool, AmbiaError> {
        queries::cache::invalidate(self.db()?, user_id, cache_key).await
    }

    async fn cache_record_feedback(
        &self,
        user_id: &str,
        cache_key: &str,
        feedback: Feedback,
        tuning: &FeedbackTuning,
    ) -> Result<Option<CacheEntry>, AmbiaError> {
        queries::cache::record_feedback(self.db()?, user_id, cache_key, feedback, tuning).await
    }

    async fn cache_sweep(&self, policy: &SweepPolicy) -> Result<u64, AmbiaError> {
        queries::cache::sweep(self.db()?, policy).await
    }

    async fn cache_stats(
        &self,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CacheStats, AmbiaError> {
        queries::cache::stats(self.db()?, user_id, now).await
    }

    // --- Activity ---

    async fn record_activity(&self, record: &ActivityRecord) -> Result<(), AmbiaError> {
        queries::activity::record(self.db()?, record).await
    }

    async fn recently_active_users(&self, since: DateTime<Utc>) -> Result<Vec<String>, AmbiaError> {
        queries::activity::active_users(self.db()?, since).await
    }

    // --- Behaviour patterns ---

    async fn observe_pattern(
        &self,
        observation: &PatternObservation,
        alpha: f64,
        now: DateTime<Utc>,
    ) -> Result<(), AmbiaError> {
        queries::patterns::observe(self.db()?, observation, alpha, now).await
    }

    async fn record_pattern_outcome(
        &self,
        user_id: &str,
        pattern_name: &str,
        success: bool,
        alpha: f64,
        now: DateTime<Utc>,
    ) -> Result<bool, AmbiaError> {
        queries::patterns::record_outcome(self.db()?, user_id, pattern_name, success, alpha, now)
            .await
    }

    async fn top_patterns(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<BehaviorPattern>, AmbiaError> {
        queries::patterns::top(self.db()?, user_id, limit).await
    }

    async fn get_pattern(
        &self,
        user_id: &str,
        pattern_name: &str,
    ) -> Result<Option<BehaviorPattern>, AmbiaError> {
        queries::patterns::get(self.db()?, user_id, pattern_name).await
    }

    // --- Audit and context ---

    async fn record_decision(&self, decision: &ReasoningDecision) -> Result<(), AmbiaError> {
        queries::decisions::record(self.db()?, decision).await
    }

    async fn recent_decisions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ReasoningDecision>, AmbiaError> {
        queries::decisions::recent(self.db()?, user_id, limit).await
    }

    async fn record_snapshot(&self, snapshot: &ContextSnapshot) -> Result<(), AmbiaError> {
        queries::activity::record_snapshot(self.db()?, snapshot).await
    }
}
