// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The orchestrator ties the reasoner, queue, generator and cache together
//! and owns the process-local in-flight map used to coalesce on-demand
//! generation.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use ambia_config::model::AmbiaConfig;
use ambia_core::clock::days;
use ambia_core::types::{CacheEntry, CachePut, CacheType, DecisionType, MaintenanceReport};
use ambia_core::{AmbiaError, Clock, ContentGenerator, PatternModel, StorageAdapter};
use ambia_reasoner::{Reasoner, ReasonerSettings};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::cache::{CacheSettings, ResultCache};
use crate::coalesce::{InFlight, Slot};
use crate::generator::{Generator, GeneratorSettings, PageRequest, SweepReport};
use crate::scheduler::{Admission, GenerationScheduler, QueueSettings};

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Patterns pre-generated per user by [`Orchestrator::pregenerate_valuable_pages`].
    pub pregenerate_top_n: usize,
    /// Users with activity inside this window are scanned.
    pub active_user_window: Duration,
    /// Timeout for on-demand generation.
    pub generation_timeout: StdDuration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AmbiaConfig) -> Self {
        Self {
            pregenerate_top_n: config.pregenerate.top_n,
            active_user_window: days(config.reasoner.active_user_window_days),
            generation_timeout: StdDuration::from_secs(config.generator.timeout_secs),
        }
    }
}

/// Whether [`Orchestrator::think`] found anything worth generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanDecision {
    Generate,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPage {
    pub query: String,
    pub when_relevant: DateTime<Utc>,
    pub confidence: f64,
}

/// What to generate for a user right now. Executing it is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThinkPlan {
    pub user_id: String,
    pub decision: PlanDecision,
    pub pages: Vec<PlannedPage>,
}

/// Result of one pre-generated query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PregenerateResult {
    pub query: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Totals for one [`Orchestrator::scan_active_users`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub users: usize,
    pub candidates: usize,
    pub queued: usize,
    pub duplicates: usize,
    pub already_cached: usize,
    pub below_threshold: usize,
    pub errors: usize,
}

/// Where an on-demand page came from; decides its cache metadata.
enum Origin<'a> {
    OnDemand,
    Pattern { name: &'a str, confidence: f64 },
}

pub struct Orchestrator {
    storage: Arc<dyn StorageAdapter>,
    reasoner: Arc<Reasoner>,
    scheduler: Arc<GenerationScheduler>,
    generator: Arc<Generator>,
    cache: Arc<ResultCache>,
    clock: Arc<dyn Clock>,
    in_flight: InFlight<CacheEntry>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        reasoner: Arc<Reasoner>,
        scheduler: Arc<GenerationScheduler>,
        generator: Arc<Generator>,
        cache: Arc<ResultCache>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            storage,
            reasoner,
            scheduler,
            generator,
            cache,
            clock,
            in_flight: InFlight::new(),
            settings,
        }
    }

    /// Wires every component from configuration.
    pub fn from_config(
        config: &AmbiaConfig,
        storage: Arc<dyn StorageAdapter>,
        pattern_model: Arc<dyn PatternModel>,
        content: Arc<dyn ContentGenerator>,
        clock: Arc<dyn Clock>,
        worker_id: impl Into<String>,
    ) -> Self {
        let reasoner = Arc::new(Reasoner::new(
            storage.clone(),
            pattern_model,
            clock.clone(),
            ReasonerSettings::from_config(config),
        ));
        let scheduler = Arc::new(GenerationScheduler::new(
            storage.clone(),
            clock.clone(),
            QueueSettings::from_config(&config.queue, &config.thresholds),
        ));
        let cache = Arc::new(ResultCache::new(
            storage.clone(),
            clock.clone(),
            CacheSettings::from_config(&config.cache),
        ));
        let generator = Arc::new(Generator::new(
            storage.clone(),
            scheduler.clone(),
            cache.clone(),
            content,
            clock.clone(),
            GeneratorSettings::from_config(config, worker_id),
        ));
        Self::new(
            storage,
            reasoner,
            scheduler,
            generator,
            cache,
            clock,
            OrchestratorSettings::from_config(config),
        )
    }

    pub fn scheduler(&self) -> &GenerationScheduler {
        &self.scheduler
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Decides which predicted pages are worth generating now.
    pub async fn think(&self, user_id: &str) -> Result<ThinkPlan, AmbiaError> {
        let reasoning = self.reasoner.reason(user_id).await?;

        let mut pages = Vec::new();
        for candidate in &reasoning.candidates {
            if !matches!(
                candidate.decision,
                DecisionType::ShowNow | DecisionType::ShowLater
            ) {
                continue;
            }
            let key = ResultCache::key(user_id, &candidate.predicted_query);
            if self.cache.peek(user_id, &key).await?.is_some() {
                continue;
            }
            pages.push(PlannedPage {
                query: candidate.predicted_query.clone(),
                when_relevant: candidate.scheduled_for,
                confidence: candidate.confidence,
            });
        }

        let decision = if pages.is_empty() {
            PlanDecision::Skip
        } else {
            PlanDecision::Generate
        };
        debug!(user_id, pages = pages.len(), ?decision, "think complete");
        Ok(ThinkPlan {
            user_id: user_id.to_string(),
            decision,
            pages,
        })
    }

    /// Returns the cached page for `query`, generating it with `content` on a
    /// miss. Concurrent callers for the same key share one generation; a
    /// failure reaches every one of them as [`AmbiaError::GenerationFailed`].
    pub async fn smart_generate(
        &self,
        user_id: &str,
        query: &str,
        content: &dyn ContentGenerator,
    ) -> Result<CacheEntry, AmbiaError> {
        self.smart_generate_from(user_id, query, content, Origin::OnDemand)
            .await
    }

    async fn smart_generate_from(
        &self,
        user_id: &str,
        query: &str,
        content: &dyn ContentGenerator,
        origin: Origin<'_>,
    ) -> Result<CacheEntry, AmbiaError> {
        let key = ResultCache::key(user_id, query);
        if let Some(hit) = self.cache.get(user_id, &key).await? {
            return Ok(hit);
        }

        let leader = match self.in_flight.join(&key) {
            Slot::Follower(follower) => {
                debug!(user_id, cache_key = %key, "joining in-flight generation");
                return follower
                    .wait()
                    .await
                    .map_err(|reason| AmbiaError::GenerationFailed {
                        cache_key: key,
                        reason,
                    });
            }
            Slot::Leader(leader) => leader,
        };

        // Another leader may have finished between the lookup and the join.
        if let Some(hit) = self.cache.get(user_id, &key).await? {
            leader.finish(Ok(hit.clone()));
            return Ok(hit);
        }

        match self
            .generate_and_store(user_id, query, &key, content, origin)
            .await
        {
            Ok(entry) => {
                leader.finish(Ok(entry.clone()));
                Ok(entry)
            }
            Err(error) => {
                let reason = error.to_string();
                warn!(user_id, cache_key = %key, error = %reason, "on-demand generation failed");
                leader.finish(Err(reason.clone()));
                Err(AmbiaError::GenerationFailed {
                    cache_key: key,
                    reason,
                })
            }
        }
    }

    async fn generate_and_store(
        &self,
        user_id: &str,
        query: &str,
        key: &str,
        content: &dyn ContentGenerator,
        origin: Origin<'_>,
    ) -> Result<CacheEntry, AmbiaError> {
        let (cache_type, relevance, trigger_conditions) = match origin {
            Origin::OnDemand => (CacheType::FrequentQuery, 1.0, json!({"source": "on_demand"})),
            Origin::Pattern { name, confidence } => (
                CacheType::Pattern,
                confidence.clamp(0.0, 1.0),
                json!({"source": "pattern", "pattern_name": name}),
            ),
        };

        let page = self
            .generator
            .generate_page(
                content,
                PageRequest {
                    user_id,
                    query,
                    predicted_need: query,
                    extra_context: &trigger_conditions,
                    prompt_template: None,
                },
                self.settings.generation_timeout,
            )
            .await?;

        let entry = CachePut {
            cache_type,
            source_query: query.to_string(),
            payload: page.components,
            relevance_score: relevance,
            trigger_conditions,
            valid_until: self.cache.fresh_valid_until(),
            generation_cost_tokens: page.tokens_used,
            generation_time_ms: Some(page.elapsed_ms),
        };
        self.cache.put(user_id, key, &entry).await?;
        self.cache
            .peek(user_id, key)
            .await?
            .ok_or_else(|| AmbiaError::Internal(format!("cache entry {key} vanished after write")))
    }

    /// Pre-generates pages for the user's most valuable patterns. Per-query
    /// failures are reported in the result list, never returned as errors.
    pub async fn pregenerate_valuable_pages(
        &self,
        user_id: &str,
        content: &dyn ContentGenerator,
    ) -> Result<Vec<PregenerateResult>, AmbiaError> {
        let patterns = self
            .storage
            .top_patterns(user_id, self.settings.pregenerate_top_n)
            .await?;

        let mut results = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            let query = pattern.query();
            let origin = Origin::Pattern {
                name: &pattern.pattern_name,
                confidence: pattern.confidence_score,
            };
            let outcome = self
                .smart_generate_from(user_id, &query, content, origin)
                .await;
            results.push(match outcome {
                Ok(_) => PregenerateResult {
                    query,
                    success: true,
                    error: None,
                },
                Err(error) => PregenerateResult {
                    query,
                    success: false,
                    error: Some(error.to_string()),
                },
            });
        }

        let generated = results.iter().filter(|r| r.success).count();
        info!(user_id, patterns = patterns.len(), generated, "pre-generation complete");
        Ok(results)
    }

    /// Cache sweep, expiry of stale queued jobs and release of dead leases.
    pub async fn maintain(&self) -> Result<MaintenanceReport, AmbiaError> {
        let report = MaintenanceReport {
            cache_entries_evicted: self.cache.sweep().await?,
            jobs_cancelled: self.scheduler.expire_queued().await?,
            leases_released: self.scheduler.release_expired_leases().await?,
        };
        info!(
            evicted = report.cache_entries_evicted,
            cancelled = report.jobs_cancelled,
            released = report.leases_released,
            "maintenance complete"
        );
        Ok(report)
    }

    /// Reasons over every recently active user and queues their candidates.
    /// Per-user failures are logged and skipped.
    pub async fn scan_active_users(&self) -> Result<ScanReport, AmbiaError> {
        let since = self.clock.now() - self.settings.active_user_window;
        let users = self.storage.recently_active_users(since).await?;
        let mut report = ScanReport {
            users: users.len(),
            ..ScanReport::default()
        };

        for user_id in &users {
            let reasoning = match self.reasoner.reason(user_id).await {
                Ok(reasoning) => reasoning,
                Err(error) => {
                    warn!(user_id = %user_id, error = %error, "reasoning failed, skipping user");
                    report.errors += 1;
                    continue;
                }
            };
            report.candidates += reasoning.candidates.len();

            for candidate in &reasoning.candidates {
                match self.scheduler.enqueue(candidate).await {
                    Ok(Admission::Queued(_)) => report.queued += 1,
                    Ok(Admission::Duplicate) => report.duplicates += 1,
                    Ok(Admission::AlreadyCached) => report.already_cached += 1,
                    Ok(Admission::BelowThreshold) => report.below_threshold += 1,
                    Err(error) => {
                        warn!(user_id = %user_id, error = %error, "enqueue failed");
                        report.errors += 1;
                    }
                }
            }
        }

        info!(
            users = report.users,
            candidates = report.candidates,
            queued = report.queued,
            errors = report.errors,
            "active-user scan complete"
        );
        Ok(report)
    }

    /// One generation sweep with this process's worker id.
    pub async fn run_generation_sweep(&self) -> Result<SweepReport, AmbiaError> {
        self.generator.run_sweep().await
    }
}

