// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the reasoner, queue, cache and orchestrator.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::component::Component;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays in the pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Generator,
    PatternModel,
}

// --- Queue ---

/// Lifecycle state of a generation job.
///
/// `queued -> processing -> {completed, queued (retry), failed}` and
/// `queued -> cancelled`. The last three are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Kind of work a queued job represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Prediction,
    PatternAnalysis,
    DataOrganization,
    CostOptimization,
}

/// A durable entry in the `generation_queue` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub job_type: JobType,
    /// 0..=100, higher is claimed first.
    pub priority: u8,
    pub predicted_need: String,
    /// Semantic query the result cache key is derived from.
    pub source_query: String,
    pub generation_context: serde_json::Value,
    pub prompt_template: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub status: JobStatus,
    /// Number of failed attempts. Never reset, never exceeds `max_attempts`.
    pub attempts: u32,
    pub max_attempts: u32,
    pub result_cache_key: Option<String>,
    pub error_message: Option<String>,
    pub claimed_by: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating a job. The queue assigns id, status, attempts and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub user_id: String,
    pub job_type: JobType,
    pub priority: u8,
    pub predicted_need: String,
    pub source_query: String,
    pub generation_context: serde_json::Value,
    pub prompt_template: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub max_attempts: u32,
}

/// Result of an enqueue attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new job was created with this id.
    Queued(String),
    /// An equivalent live job already exists; nothing was written.
    Duplicate,
}

/// Where a failed job ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back in `queued`, claimable again.
    Requeued { attempts: u32 },
    /// Permanently `failed`.
    Failed { attempts: u32 },
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl QueueStats {
    pub fn add(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Queued => self.queued += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
            JobStatus::Cancelled => self.cancelled += count,
        }
    }
}

// --- Cache ---

/// Why a cache entry was produced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    Prediction,
    Pattern,
    FrequentQuery,
    Scheduled,
}

/// Explicit user feedback on a served entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Helpful,
    Neutral,
    NotHelpful,
}

/// A row of the `page_cache` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub user_id: String,
    pub cache_key: String,
    pub cache_type: CacheType,
    pub source_query: String,
    pub payload: Vec<Component>,
    pub relevance_score: f64,
    pub trigger_conditions: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub was_shown: bool,
    pub user_feedback: Option<Feedback>,
    pub generation_cost_tokens: Option<u32>,
    pub generation_time_ms: Option<u64>,
}

impl CacheEntry {
    /// Whether the entry may still be served at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}

/// Payload and metadata written by a cache put.
#[derive(Debug, Clone, PartialEq)]
pub struct CachePut {
    pub cache_type: CacheType,
    pub source_query: String,
    pub payload: Vec<Component>,
    pub relevance_score: f64,
    pub trigger_conditions: serde_json::Value,
    pub valid_until: DateTime<Utc>,
    pub generation_cost_tokens: Option<u32>,
    pub generation_time_ms: Option<u64>,
}

/// Relevance adjustment applied when feedback is recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackTuning {
    /// Added on `helpful`, result capped at 1.
    pub helpful_boost: f64,
    /// Multiplied in on `not_helpful`.
    pub not_helpful_factor: f64,
}

impl Default for FeedbackTuning {
    fn default() -> Self {
        Self {
            helpful_boost: 0.1,
            not_helpful_factor: 0.5,
        }
    }
}

/// Thresholds evaluated by a cache maintenance sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPolicy {
    /// Entries expired before this instant are deleted.
    pub expired_before: DateTime<Utc>,
    /// Never-accessed entries created before this instant are deleted.
    pub unused_created_before: DateTime<Utc>,
    /// Entries whose relevance fell below this floor are deleted.
    pub relevance_floor: f64,
}

/// Aggregate counters over the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: u64,
    pub valid_entries: u64,
    pub total_accesses: u64,
    pub helpful: u64,
    pub not_helpful: u64,
}

// --- Patterns and reasoning ---

/// Shape of a detected behavioural pattern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    TimeBased,
    QueryBased,
    EventBased,
}

/// Learned per-user aggregate, unique per `(user_id, pattern_name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub user_id: String,
    pub pattern_type: PatternType,
    pub pattern_name: String,
    pub conditions: serde_json::Value,
    pub confidence_score: f64,
    pub occurrences: u64,
    pub success_rate: f64,
    pub updated_at: DateTime<Utc>,
}

impl BehaviorPattern {
    /// Ranking weight used for bulk pre-generation.
    pub fn value_score(&self) -> f64 {
        self.confidence_score * self.success_rate
    }

    /// The query to pre-generate for this pattern.
    pub fn query(&self) -> String {
        self.conditions
            .get("predicted_query")
            .and_then(|v| v.as_str())
            .filter(|q| !q.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.pattern_name.clone())
    }
}

/// One piece of evidence for a behaviour pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternObservation {
    pub user_id: String,
    pub pattern_type: PatternType,
    pub pattern_name: String,
    pub conditions: serde_json::Value,
    pub confidence: f64,
}

/// What the reasoner recommends doing with a prediction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    ShowNow,
    ShowLater,
    Cache,
    Ignore,
}

/// How soon a decision needs acting on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

/// Scored output of the reasoner. Never persisted directly, only via the job it spawns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePrediction {
    pub user_id: String,
    pub predicted_need: String,
    /// Semantic query used for the cache key.
    pub predicted_query: String,
    pub trigger_pattern: String,
    pub pattern_type: PatternType,
    pub decision: DecisionType,
    pub scheduled_for: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub confidence: f64,
    pub generation_context: serde_json::Value,
    pub reasoning: String,
}

impl CandidatePrediction {
    /// Queue priority derived from confidence, 0..=100.
    pub fn priority(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Append-only audit record of one reasoner invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningDecision {
    pub id: String,
    pub user_id: String,
    pub context_snapshot: serde_json::Value,
    pub decision_type: DecisionType,
    pub priority: u8,
    pub urgency: Urgency,
    pub reasoning: String,
    pub candidate_count: u32,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

// --- Context ---

/// Coarse bucket of the local hour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Buckets an hour of the day: 5-11 morning, 12-16 afternoon, 17-20 evening, else night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

/// One row of the `activity_log` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub user_id: String,
    pub action_type: String,
    pub query: Option<String>,
    #[serde(default)]
    pub components_shown: Vec<String>,
    pub component_interacted: Option<String>,
    pub time_of_day: TimeOfDay,
    pub day_of_week: String,
    pub is_weekend: bool,
    pub timestamp: DateTime<Utc>,
}

impl ActivityRecord {
    /// Builds a record whose calendar fields are derived from `timestamp`.
    pub fn at(
        user_id: impl Into<String>,
        action_type: impl Into<String>,
        query: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let weekday = timestamp.weekday();
        Self {
            user_id: user_id.into(),
            action_type: action_type.into(),
            query,
            components_shown: Vec::new(),
            component_interacted: None,
            time_of_day: TimeOfDay::from_hour(timestamp.hour()),
            day_of_week: weekday_name(weekday).to_string(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
            timestamp,
        }
    }
}

/// A calendar event visible in a context snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingEvent {
    pub title: String,
    pub starts_at: DateTime<Utc>,
}

/// Point-in-time context for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub user_id: String,
    pub captured_at: DateTime<Utc>,
    pub time_of_day: TimeOfDay,
    pub day_of_week: String,
    pub is_weekend: bool,
    #[serde(default)]
    pub upcoming_events: Vec<UpcomingEvent>,
    pub location_class: Option<String>,
}

impl ContextSnapshot {
    /// A snapshot carrying only the clock-derived fields.
    pub fn from_clock(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let weekday = now.weekday();
        Self {
            user_id: user_id.into(),
            captured_at: now,
            time_of_day: TimeOfDay::from_hour(now.hour()),
            day_of_week: weekday_name(weekday).to_string(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
            upcoming_events: Vec::new(),
            location_class: None,
        }
    }
}

/// Full English weekday name, as stored in `activity_log.day_of_week`.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Counts produced by a maintenance run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub cache_entries_evicted: u64,
    pub jobs_cancelled: u64,
    pub leases_released: u64,
}
