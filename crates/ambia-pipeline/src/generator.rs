// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generator worker: claims queued jobs, generates pages under a timeout,
//! validates them and writes them to the result cache.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use ambia_config::model::AmbiaConfig;
use ambia_core::clock::days;
use ambia_core::types::{CachePut, CacheType, FailOutcome, Job};
use ambia_core::{
    ActivitySummary, AmbiaError, Clock, Component, ContentGenerator, GenerationRequest,
    StorageAdapter, parse_document,
};
use chrono::Duration;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::prompt::{DEFAULT_PROMPT_TEMPLATE, PromptVars, render_prompt};
use crate::scheduler::GenerationScheduler;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub worker_id: String,
    /// Upper bound on a single generation call.
    pub timeout: StdDuration,
    pub activity_lookback: Duration,
    pub activity_limit: usize,
    pub max_recent_queries: usize,
    /// Overrides [`DEFAULT_PROMPT_TEMPLATE`] for jobs without their own template.
    pub prompt_template: Option<String>,
    pub jobs_per_sweep: usize,
    /// Wall-clock budget for one sweep.
    pub batch_budget: StdDuration,
}

impl GeneratorSettings {
    pub fn from_config(config: &AmbiaConfig, worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            timeout: StdDuration::from_secs(config.generator.timeout_secs),
            activity_lookback: days(config.generator.activity_lookback_days),
            activity_limit: config.generator.activity_limit,
            max_recent_queries: config.generator.max_recent_queries,
            prompt_template: config.generator.prompt_template.clone(),
            jobs_per_sweep: config.queue.jobs_per_sweep,
            batch_budget: StdDuration::from_secs(config.queue.batch_budget_secs),
        }
    }
}

/// What a single job run ended in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { cache_key: String },
    Retried { attempts: u32 },
    Failed { attempts: u32 },
    /// The job left `processing` underneath us (for example its lease was
    /// released); nothing was recorded.
    Lost,
}

/// Counters for one [`Generator::run_sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
}

/// A validated page fresh from the generation function.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPage {
    pub components: Vec<Component>,
    pub tokens_used: Option<u32>,
    pub elapsed_ms: u64,
}

/// Inputs for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub user_id: &'a str,
    pub query: &'a str,
    pub predicted_need: &'a str,
    /// Job- or pattern-specific context, nested under `"pattern"`.
    pub extra_context: &'a Value,
    pub prompt_template: Option<&'a str>,
}

pub struct Generator {
    storage: Arc<dyn StorageAdapter>,
    scheduler: Arc<GenerationScheduler>,
    cache: Arc<ResultCache>,
    content: Arc<dyn ContentGenerator>,
    clock: Arc<dyn Clock>,
    settings: GeneratorSettings,
}

impl Generator {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        scheduler: Arc<GenerationScheduler>,
        cache: Arc<ResultCache>,
        content: Arc<dyn ContentGenerator>,
        clock: Arc<dyn Clock>,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            storage,
            scheduler,
            cache,
            content,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Generates and validates one page with `content`, bounded by `timeout`.
    pub async fn generate_page(
        &self,
        content: &dyn ContentGenerator,
        request: PageRequest<'_>,
        timeout: StdDuration,
    ) -> Result<GeneratedPage, AmbiaError> {
        let started = Instant::now();
        let context = self
            .generation_context(request.user_id, request.extra_context)
            .await?;
        let template = request
            .prompt_template
            .or(self.settings.prompt_template.as_deref())
            .unwrap_or(DEFAULT_PROMPT_TEMPLATE);
        let prompt = render_prompt(
            template,
            &PromptVars {
                predicted_need: request.predicted_need,
                query: request.query,
                context: &context,
                now: self.clock.now(),
            },
        );

        let generation = GenerationRequest {
            user_id: request.user_id.to_string(),
            query: request.query.to_string(),
            predicted_need: request.predicted_need.to_string(),
            context,
            prompt,
        };
        let document = tokio::time::timeout(timeout, content.generate(&generation))
            .await
            .map_err(|_| AmbiaError::Timeout { duration: timeout })??;
        let components = parse_document(&document.document)?;

        Ok(GeneratedPage {
            components,
            tokens_used: document.tokens_used,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Recent-activity summary plus the caller's context.
    async fn generation_context(&self, user_id: &str, extra: &Value) -> Result<Value, AmbiaError> {
        let now = self.clock.now();
        let activity = self
            .storage
            .recent_activity(
                user_id,
                now - self.settings.activity_lookback,
                self.settings.activity_limit,
            )
            .await?;
        let summary = ActivitySummary::from_records(&activity, self.settings.max_recent_queries);
        Ok(json!({
            "recent_queries": summary.recent_queries,
            "time_patterns": summary.time_of_day,
            "total_activities": summary.total_actions,
            "pattern": extra,
        }))
    }

    /// Runs a claimed job with the configured timeout.
    pub async fn run(&self, job: &Job) -> Result<JobOutcome, AmbiaError> {
        self.run_with_timeout(job, self.settings.timeout).await
    }

    /// Generation errors are recorded on the job, never returned. Only
    /// storage failures while recording the outcome propagate.
    async fn run_with_timeout(
        &self,
        job: &Job,
        timeout: StdDuration,
    ) -> Result<JobOutcome, AmbiaError> {
        let cache_key = ResultCache::key(&job.user_id, &job.source_query);
        debug!(job_id = %job.id, user_id = %job.user_id, cache_key, "running job");

        match self.produce(job, &cache_key, timeout).await {
            Ok(()) => {
                if self
                    .scheduler
                    .complete(&job.id, &self.settings.worker_id, &cache_key)
                    .await? {
                    info!(job_id = %job.id, user_id = %job.user_id, cache_key, "job completed");
                    Ok(JobOutcome::Completed { cache_key })
                } else {
                    warn!(job_id = %job.id, "job was no longer processing at completion");
                    Ok(JobOutcome::Lost)
                }
            }
            Err(error) => Ok(match self
                .scheduler
                .fail(job, &self.settings.worker_id, &error)
                .await? {
                Some(FailOutcome::Requeued { attempts }) => JobOutcome::Retried { attempts },
                Some(FailOutcome::Failed { attempts }) => JobOutcome::Failed { attempts },
                None => JobOutcome::Lost,
            }),
        }
    }

    async fn produce(
        &self,
        job: &Job,
        cache_key: &str,
        timeout: StdDuration,
    ) -> Result<(), AmbiaError> {
        let page = self
            .generate_page(
                self.content.as_ref(),
                PageRequest {
                    user_id: &job.user_id,
                    query: &job.source_query,
                    predicted_need: &job.predicted_need,
                    extra_context: &job.generation_context,
                    prompt_template: job.prompt_template.as_deref(),
                },
                timeout,
            )
            .await?;

        let relevance = job
            .generation_context
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(f64::from(job.priority) / 100.0)
            .clamp(0.0, 1.0);
        let entry = CachePut {
            cache_type: CacheType::Prediction,
            source_query: job.source_query.clone(),
            payload: page.components,
            relevance_score: relevance,
            trigger_conditions: job.generation_context.clone(),
            valid_until: self.cache.fresh_valid_until(),
            generation_cost_tokens: page.tokens_used,
            generation_time_ms: Some(page.elapsed_ms),
        };
        self.cache.put(&job.user_id, cache_key, &entry).await
    }

    /// Claims and runs jobs until the queue is drained, `jobs_per_sweep` jobs
    /// were claimed or the batch budget is spent. Each call's timeout is
    /// capped by what is left of the budget.
    pub async fn run_sweep(&self) -> Result<SweepReport, AmbiaError> {
        let deadline = Instant::now() + self.settings.batch_budget;
        let mut report = SweepReport::default();

        while report.claimed < self.settings.jobs_per_sweep {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("sweep budget exhausted");
                break;
            }
            let Some(job) = self.scheduler.claim(&self.settings.worker_id).await? else {
                break;
            };
            report.claimed += 1;

            match self
                .run_with_timeout(&job, self.settings.timeout.min(remaining))
                .await?
            {
                JobOutcome::Completed { .. } => report.completed += 1,
                JobOutcome::Retried { .. } => report.retried += 1,
                JobOutcome::Failed { .. } => report.failed += 1,
                JobOutcome::Lost => {}
            }
        }

        info!(
            worker_id = %self.settings.worker_id,
            claimed = report.claimed,
            completed = report.completed,
            retried = report.retried,
            failed = report.failed,
            "generation sweep finished"
        );
        Ok(report)
    }
}

