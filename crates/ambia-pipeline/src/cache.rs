// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result cache service over the `page_cache` table.
//!
//! Validity is decided against the injected clock; all row-level atomicity
//! lives in the storage layer.

use std::sync::Arc;

use ambia_config::model::CacheConfig;
use ambia_core::clock::{hours, mins};
use ambia_core::types::{CacheEntry, CachePut, CacheStats, Feedback, FeedbackTuning, SweepPolicy};
use ambia_core::{AmbiaError, Clock, StorageAdapter, fingerprint};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// How long a freshly generated page stays servable.
    pub validity: Duration,
    /// Expired entries are kept this long before a sweep removes them.
    pub grace_period: Duration,
    /// Never-accessed entries older than this are swept.
    pub stale_unused: Duration,
    pub eviction_floor: f64,
    pub tuning: FeedbackTuning,
    /// Step size for pattern success-rate updates driven by feedback.
    pub success_rate_alpha: f64,
}

impl CacheSettings {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            validity: mins(config.validity_mins),
            grace_period: mins(config.grace_period_mins),
            stale_unused: hours(config.stale_unused_hours),
            eviction_floor: config.eviction_floor,
            tuning: FeedbackTuning {
                helpful_boost: config.helpful_boost,
                not_helpful_factor: config.not_helpful_factor,
            },
            success_rate_alpha: config.success_rate_alpha,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

pub struct ResultCache {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
}

impl ResultCache {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            storage,
            clock,
            settings,
        }
    }

    /// Cache key for a user's semantic query.
    pub fn key(user_id: &str, query: &str) -> String {
        fingerprint(user_id, query)
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Expiry for an entry written now.
    pub fn fresh_valid_until(&self) -> DateTime<Utc> {
        self.clock.now() + self.settings.validity
    }

    /// Serves a valid entry and counts the access.
    pub async fn get(
        &self,
        user_id: &str,
        cache_key: &str,
    ) -> Result<Option<CacheEntry>, AmbiaError> {
        let hit = self
            .storage
            .cache_get(user_id, cache_key, self.clock.now())
            .await?;
        debug!(user_id, cache_key, hit = hit.is_some(), "cache lookup");
        Ok(hit)
    }

    /// Valid entry without access tracking.
    pub async fn peek(
        &self,
        user_id: &str,
        cache_key: &str,
    ) -> Result<Option<CacheEntry>, AmbiaError> {
        self.storage
            .cache_peek(user_id, cache_key, self.clock.now())
            .await
    }

    pub async fn put(
        &self,
        user_id: &str,
        cache_key: &str,
        entry: &CachePut,
    ) -> Result<(), AmbiaError> {
        self.storage
            .cache_put(user_id, cache_key, entry, self.clock.now())
            .await?;
        debug!(
            user_id,
            cache_key,
            components = entry.payload.len(),
            "cache entry written"
        );
        Ok(())
    }

    pub async fn invalidate(&self, user_id: &str, cache_key: &str) -> Result<bool, AmbiaError> {
        self.storage.cache_invalidate(user_id, cache_key).await
    }

    /// Stores feedback and adjusts relevance. When the entry was produced
    /// from a known pattern, that pattern's success rate moves too.
    pub async fn record_feedback(
        &self,
        user_id: &str,
        cache_key: &str,
        feedback: Feedback,
    ) -> Result<Option<CacheEntry>, AmbiaError> {
        let Some(entry) = self
            .storage
            .cache_record_feedback(user_id, cache_key, feedback, &self.settings.tuning)
            .await?
        else {
            return Ok(None);
        };

        let success = match feedback {
            Feedback::Helpful => Some(true),
            Feedback::NotHelpful => Some(false),
            Feedback::Neutral => None,
        };
        let pattern = entry
            .trigger_conditions
            .get("pattern_name")
            .and_then(|v| v.as_str());
        if let (Some(success), Some(pattern)) = (success, pattern) {
            let updated = self
                .storage
                .record_pattern_outcome(
                    user_id,
                    pattern,
                    success,
                    self.settings.success_rate_alpha,
                    self.clock.now(),
                )
                .await?;
            if !updated {
                warn!(user_id, pattern, "feedback names an unknown pattern");
            }
        }

        info!(
            user_id,
            cache_key,
            feedback = %feedback,
            relevance = entry.relevance_score,
            "feedback recorded"
        );
        Ok(Some(entry))
    }

    /// Removes expired, never-used and low-relevance entries. Returns the count.
    pub async fn sweep(&self) -> Result<u64, AmbiaError> {
        let now = self.clock.now();
        let policy = SweepPolicy {
            expired_before: now - self.settings.grace_period,
            unused_created_before: now - self.settings.stale_unused,
            relevance_floor: self.settings.eviction_floor,
        };
        let evicted = self.storage.cache_sweep(&policy).await?;
        debug!(evicted, "cache sweep complete");
        Ok(evicted)
    }

    pub async fn stats(&self, user_id: Option<&str>) -> Result<CacheStats, AmbiaError> {
        self.storage.cache_stats(user_id, self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambia_core::types::{CacheType, PatternObservation, PatternType};
    use ambia_core::{Component, parse_document};
    use ambia_test_utils::{TestHarness, sample_document};
    use serde_json::json;

    fn cache(harness: &TestHarness) -> ResultCache {
        ResultCache::new(
            harness.storage.clone(),
            harness.clock.clone(),
            CacheSettings::from_config(&harness.config.cache),
        )
    }

    fn payload() -> Vec<Component> {
        parse_document(&sample_document()).unwrap()
    }

    fn put_for(cache: &ResultCache, query: &str, pattern: Option<&str>) -> CachePut {
        CachePut {
            cache_type: CacheType::Prediction,
            source_query: query.to_string(),
            payload: payload(),
            relevance_score: 0.8,
            trigger_conditions: match pattern {
                Some(name) => json!({"pattern_name": name}),
                None => json!({}),
            },
            valid_until: cache.fresh_valid_until(),
            generation_cost_tokens: Some(42),
            generation_time_ms: Some(900),
        }
    }

    #[tokio::test]
    async fn entries_expire_after_validity_window() {
        let harness = TestHarness::new().await.unwrap();
        let cache = cache(&harness);
        let key = ResultCache::key("u1", "Weather Today");
        cache
            .put("u1", &key, &put_for(&cache, "weather today", None))
            .await
            .unwrap();

        harness.clock.advance(Duration::minutes(29));
        let hit = cache.get("u1", &key).await.unwrap().unwrap();
        assert_eq!(hit.access_count, 1);
        assert!(hit.was_shown);

        harness.clock.advance(Duration::minutes(1));
        assert!(cache.get("u1", &key).await.unwrap().is_none());
        assert!(cache.peek("u1", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn feedback_moves_pattern_success_rate() {
        let harness = TestHarness::new().await.unwrap();
        let cache = cache(&harness);
        harness
            .storage
            .observe_pattern(
                &PatternObservation {
                    user_id: "u1".into(),
                    pattern_type: PatternType::TimeBased,
                    pattern_name: "morning_weather".into(),
                    conditions: json!({}),
                    confidence: 0.8,
                },
                0.3,
                harness.clock.now(),
            )
            .await
            .unwrap();

        let key = ResultCache::key("u1", "weather");
        cache
            .put("u1", &key, &put_for(&cache, "weather", Some("morning_weather")))
            .await
            .unwrap();

        let entry = cache
            .record_feedback("u1", &key, Feedback::Helpful)
            .await
            .unwrap()
            .unwrap();
        assert!((entry.relevance_score - 0.9).abs() < 1e-9);
        let pattern = harness
            .storage
            .get_pattern("u1", "morning_weather")
            .await
            .unwrap()
            .unwrap();
        assert!((pattern.success_rate - 0.6).abs() < 1e-9);

        cache
            .record_feedback("u1", &key, Feedback::Neutral)
            .await
            .unwrap();
        let pattern = harness
            .storage
            .get_pattern("u1", "morning_weather")
            .await
            .unwrap()
            .unwrap();
        assert!((pattern.success_rate - 0.6).abs() < 1e-9);

        assert!(
            cache
                .record_feedback("u1", "missing", Feedback::Helpful)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn sweep_uses_grace_period() {
        let harness = TestHarness::new().await.unwrap();
        let cache = cache(&harness);
        let key = ResultCache::key("u1", "news");
        cache
            .put("u1", &key, &put_for(&cache, "news", None))
            .await
            .unwrap();
        cache.get("u1", &key).await.unwrap();

        // Expired 30 minutes ago: still inside the one-hour grace period.
        harness.clock.advance(Duration::minutes(60));
        assert_eq!(cache.sweep().await.unwrap(), 0);

        harness.clock.advance(Duration::minutes(31));
        assert_eq!(cache.sweep().await.unwrap(), 1);
        assert_eq!(cache.stats(Some("u1")).await.unwrap().entries, 0);
    }
}
