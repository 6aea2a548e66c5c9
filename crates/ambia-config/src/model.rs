// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a mistyped key fails
//! at startup with a suggestion instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level Ambia configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AmbiaConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Confidence floors for detection and queuing.
    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub reasoner: ReasonerConfig,

    #[serde(default)]
    pub pregenerate: PregenerateConfig,

    /// Intervals of the background tasks started by `ambia serve`.
    #[serde(default)]
    pub cadence: CadenceConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// OpenAI-compatible endpoint used as the pattern model.
    #[serde(default)]
    pub pattern_model: PatternModelConfig,
}

/// Process identity and logging.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Worker identity recorded on claimed jobs. Generated when unset.
    #[serde(default)]
    pub worker_id: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            worker_id: None,
        }
    }
}

fn default_service_name() -> String {
    "ambia".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("ambia").join("ambia.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("ambia.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdsConfig {
    /// Patterns below this confidence are discarded by the reasoner.
    #[serde(default = "default_detect_threshold")]
    pub detect: f64,

    /// Candidates below this confidence are never queued.
    #[serde(default = "default_queue_threshold")]
    pub queue: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            detect: default_detect_threshold(),
            queue: default_queue_threshold(),
        }
    }
}

fn default_detect_threshold() -> f64 {
    0.6
}

fn default_queue_threshold() -> f64 {
    0.7
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Failed attempts after which a job is permanently failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Jobs for the same need scheduled within this many minutes are duplicates.
    #[serde(default = "default_dedup_window_mins")]
    pub dedup_window_mins: u64,

    /// How long a claim is held before the job counts as abandoned.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Maximum jobs claimed by one generation sweep.
    #[serde(default = "default_jobs_per_sweep")]
    pub jobs_per_sweep: usize,

    /// Wall-clock budget of one generation sweep.
    #[serde(default = "default_batch_budget_secs")]
    pub batch_budget_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            dedup_window_mins: default_dedup_window_mins(),
            lease_secs: default_lease_secs(),
            jobs_per_sweep: default_jobs_per_sweep(),
            batch_budget_secs: default_batch_budget_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_dedup_window_mins() -> u64 {
    30
}

fn default_lease_secs() -> u64 {
    300
}

fn default_jobs_per_sweep() -> usize {
    10
}

fn default_batch_budget_secs() -> u64 {
    240
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Lifetime of a freshly generated entry.
    #[serde(default = "default_validity_mins")]
    pub validity_mins: u64,

    /// Expired entries are kept this long before maintenance deletes them.
    #[serde(default = "default_grace_period_mins")]
    pub grace_period_mins: u64,

    /// Never-accessed entries older than this are deleted.
    #[serde(default = "default_stale_unused_hours")]
    pub stale_unused_hours: u64,

    /// Entries whose relevance falls below this are deleted.
    #[serde(default = "default_eviction_floor")]
    pub eviction_floor: f64,

    /// Added to relevance on helpful feedback, capped at 1.
    #[serde(default = "default_helpful_boost")]
    pub helpful_boost: f64,

    /// Multiplies relevance on not-helpful feedback.
    #[serde(default = "default_not_helpful_factor")]
    pub not_helpful_factor: f64,

    /// Smoothing factor for pattern success rates.
    #[serde(default = "default_success_rate_alpha")]
    pub success_rate_alpha: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            validity_mins: default_validity_mins(),
            grace_period_mins: default_grace_period_mins(),
            stale_unused_hours: default_stale_unused_hours(),
            eviction_floor: default_eviction_floor(),
            helpful_boost: default_helpful_boost(),
            not_helpful_factor: default_not_helpful_factor(),
            success_rate_alpha: default_success_rate_alpha(),
        }
    }
}

fn default_validity_mins() -> u64 {
    30
}

fn default_grace_period_mins() -> u64 {
    60
}

fn default_stale_unused_hours() -> u64 {
    24
}

fn default_eviction_floor() -> f64 {
    0.1
}

fn default_helpful_boost() -> f64 {
    0.1
}

fn default_not_helpful_factor() -> f64 {
    0.5
}

fn default_success_rate_alpha() -> f64 {
    0.2
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Upper bound on a single generation call.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_generator_lookback_days")]
    pub activity_lookback_days: u64,

    #[serde(default = "default_generator_activity_limit")]
    pub activity_limit: usize,

    #[serde(default = "default_max_recent_queries")]
    pub max_recent_queries: usize,

    /// Replaces the built-in prompt template. Placeholders: `{predicted_need}`,
    /// `{query}`, `{context}`, `{now}`.
    #[serde(default)]
    pub prompt_template: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_generation_timeout_secs(),
            activity_lookback_days: default_generator_lookback_days(),
            activity_limit: default_generator_activity_limit(),
            max_recent_queries: default_max_recent_queries(),
            prompt_template: None,
        }
    }
}

fn default_generation_timeout_secs() -> u64 {
    30
}

fn default_generator_lookback_days() -> u64 {
    14
}

fn default_generator_activity_limit() -> usize {
    50
}

fn default_max_recent_queries() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReasonerConfig {
    #[serde(default = "default_reasoner_lookback_days")]
    pub activity_lookback_days: u64,

    #[serde(default = "default_reasoner_activity_limit")]
    pub activity_limit: usize,

    /// Lead time used when the model gives no trigger time.
    #[serde(default = "default_lead_mins")]
    pub default_lead_mins: u64,

    /// How long a prediction stays valid after it becomes relevant.
    #[serde(default = "default_job_validity_mins")]
    pub job_validity_mins: u64,

    /// Predictions relevant within this window are shown now.
    #[serde(default = "default_imminent_window_mins")]
    pub imminent_window_mins: u64,

    /// Smoothing factor for pattern confidence.
    #[serde(default = "default_confidence_alpha")]
    pub confidence_alpha: f64,

    /// Users with activity inside this window are scanned.
    #[serde(default = "default_active_user_window_days")]
    pub active_user_window_days: u64,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            activity_lookback_days: default_reasoner_lookback_days(),
            activity_limit: default_reasoner_activity_limit(),
            default_lead_mins: default_lead_mins(),
            job_validity_mins: default_job_validity_mins(),
            imminent_window_mins: default_imminent_window_mins(),
            confidence_alpha: default_confidence_alpha(),
            active_user_window_days: default_active_user_window_days(),
        }
    }
}

fn default_reasoner_lookback_days() -> u64 {
    30
}

fn default_reasoner_activity_limit() -> usize {
    100
}

fn default_lead_mins() -> u64 {
    30
}

fn default_job_validity_mins() -> u64 {
    60
}

fn default_imminent_window_mins() -> u64 {
    15
}

fn default_confidence_alpha() -> f64 {
    0.3
}

fn default_active_user_window_days() -> u64 {
    7
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PregenerateConfig {
    /// Number of top patterns pre-generated per user.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for PregenerateConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_top_n() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CadenceConfig {
    #[serde(default = "default_scan_secs")]
    pub scan_secs: u64,

    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,

    #[serde(default = "default_pregenerate_secs")]
    pub pregenerate_secs: u64,

    #[serde(default = "default_maintain_secs")]
    pub maintain_secs: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            scan_secs: default_scan_secs(),
            sweep_secs: default_sweep_secs(),
            pregenerate_secs: default_pregenerate_secs(),
            maintain_secs: default_maintain_secs(),
        }
    }
}

fn default_scan_secs() -> u64 {
    300
}

fn default_sweep_secs() -> u64 {
    120
}

fn default_pregenerate_secs() -> u64 {
    3600
}

fn default_maintain_secs() -> u64 {
    86_400
}

/// Anthropic Messages API settings for the content generator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// API key. Falls back to `ANTHROPIC_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_anthropic_model")]
    pub model: String,

    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_anthropic_temperature")]
    pub temperature: f64,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_anthropic_model(),
            max_tokens: default_anthropic_max_tokens(),
            temperature: default_anthropic_temperature(),
            api_version: default_api_version(),
            base_url: default_anthropic_base_url(),
        }
    }
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_anthropic_max_tokens() -> u32 {
    2000
}

fn default_anthropic_temperature() -> f64 {
    0.7
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

/// OpenAI-compatible chat-completions endpoint settings for the pattern model.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PatternModelConfig {
    /// API key. Falls back to `TOGETHER_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_pattern_base_url")]
    pub base_url: String,

    #[serde(default = "default_pattern_model")]
    pub model: String,

    #[serde(default = "default_pattern_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_pattern_temperature")]
    pub temperature: f64,

    #[serde(default = "default_pattern_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PatternModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_pattern_base_url(),
            model: default_pattern_model(),
            max_tokens: default_pattern_max_tokens(),
            temperature: default_pattern_temperature(),
            timeout_secs: default_pattern_timeout_secs(),
        }
    }
}

fn default_pattern_base_url() -> String {
    "https://api.together.xyz/v1".to_string()
}

fn default_pattern_model() -> String {
    "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo".to_string()
}

fn default_pattern_max_tokens() -> u32 {
    1000
}

fn default_pattern_temperature() -> f64 {
    0.3
}

fn default_pattern_timeout_secs() -> u64 {
    30
}
