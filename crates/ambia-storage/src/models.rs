// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row encoding and decoding for the domain types in `ambia-core`.
//!
//! Timestamps are stored as fixed-width UTC text (`2026-03-02T08:00:00.000Z`)
//! so that SQL string comparison orders them chronologically.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

pub use ambia_core::types::{
    ActivityRecord, BehaviorPattern, CacheEntry, ContextSnapshot, Job, ReasoningDecision,
};

/// Formats a timestamp for storage.
pub fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_err(
    idx: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, Type::Text, e))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_err(idx, Type::Text, e))
    })
    .transpose()
}

/// Reads a non-negative INTEGER as `u64`.
fn get_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|e| conversion_err(idx, Type::Integer, e))
}

fn get_opt_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    let raw: Option<i64> = row.get(idx)?;
    raw.map(|v| u64::try_from(v).map_err(|e| conversion_err(idx, Type::Integer, e)))
        .transpose()
}

/// Clamps a `u64` into SQLite's signed INTEGER range.
pub(crate) fn sql_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, Type::Text, e))
}

fn get_opt_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse().map_err(|e| conversion_err(idx, Type::Text, e)))
        .transpose()
}

fn get_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, Type::Text, e))
}

pub(crate) const JOB_COLUMNS: &str = "id, user_id, job_type, priority, predicted_need, \
     source_query, generation_context, prompt_template, scheduled_for, valid_until, status, \
     attempts, max_attempts, result_cache_key, error_message, claimed_by, locked_until, \
     created_at, started_at, completed_at";

pub(crate) fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        user_id: row.get(1)?,
        job_type: get_enum(row, 2)?,
        priority: row.get(3)?,
        predicted_need: row.get(4)?,
        source_query: row.get(5)?,
        generation_context: get_json(row, 6)?,
        prompt_template: row.get(7)?,
        scheduled_for: get_ts(row, 8)?,
        valid_until: get_ts(row, 9)?,
        status: get_enum(row, 10)?,
        attempts: row.get(11)?,
        max_attempts: row.get(12)?,
        result_cache_key: row.get(13)?,
        error_message: row.get(14)?,
        claimed_by: row.get(15)?,
        locked_until: get_opt_ts(row, 16)?,
        created_at: get_ts(row, 17)?,
        started_at: get_opt_ts(row, 18)?,
        completed_at: get_opt_ts(row, 19)?,
    })
}

pub(crate) const CACHE_COLUMNS: &str = "user_id, cache_key, cache_type, source_query, payload, \
     relevance_score, trigger_conditions, created_at, valid_until, last_accessed, access_count, \
     was_shown, user_feedback, generation_cost_tokens, generation_time_ms";

pub(crate) fn cache_entry_from_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        user_id: row.get(0)?,
        cache_key: row.get(1)?,
        cache_type: get_enum(row, 2)?,
        source_query: row.get(3)?,
        payload: get_json(row, 4)?,
        relevance_score: row.get(5)?,
        trigger_conditions: get_json(row, 6)?,
        created_at: get_ts(row, 7)?,
        valid_until: get_ts(row, 8)?,
        last_accessed: get_opt_ts(row, 9)?,
        access_count: get_u64(row, 10)?,
        was_shown: row.get(11)?,
        user_feedback: get_opt_enum(row, 12)?,
        generation_cost_tokens: row.get(13)?,
        generation_time_ms: get_opt_u64(row, 14)?,
    })
}

pub(crate) const ACTIVITY_COLUMNS: &str = "user_id, action_type, query, components_shown, \
     component_interacted, time_of_day, day_of_week, is_weekend, timestamp";

pub(crate) fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
    Ok(ActivityRecord {
        user_id: row.get(0)?,
        action_type: row.get(1)?,
        query: row.get(2)?,
        components_shown: get_json(row, 3)?,
        component_interacted: row.get(4)?,
        time_of_day: get_enum(row, 5)?,
        day_of_week: row.get(6)?,
        is_weekend: row.get(7)?,
        timestamp: get_ts(row, 8)?,
    })
}

pub(crate) const PATTERN_COLUMNS: &str = "user_id, pattern_type, pattern_name, conditions, \
     confidence_score, occurrences, success_rate, updated_at";

pub(crate) fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<BehaviorPattern> {
    Ok(BehaviorPattern {
        user_id: row.get(0)?,
        pattern_type: get_enum(row, 1)?,
        pattern_name: row.get(2)?,
        conditions: get_json(row, 3)?,
        confidence_score: row.get(4)?,
        occurrences: get_u64(row, 5)?,
        success_rate: row.get(6)?,
        updated_at: get_ts(row, 7)?,
    })
}

pub(crate) const DECISION_COLUMNS: &str = "id, user_id, context_snapshot, decision_type, \
     priority, urgency, reasoning, candidate_count, duration_ms, created_at";

pub(crate) fn decision_from_row(row: &Row<'_>) -> rusqlite::Result<ReasoningDecision> {
    Ok(ReasoningDecision {
        id: row.get(0)?,
        user_id: row.get(1)?,
        context_snapshot: get_json(row, 2)?,
        decision_type: get_enum(row, 3)?,
        priority: row.get(4)?,
        urgency: get_enum(row, 5)?,
        reasoning: row.get(6)?,
        candidate_count: row.get(7)?,
        duration_ms: get_u64(row, 8)?,
        created_at: get_ts(row, 9)?,
    })
}

pub(crate) const SNAPSHOT_COLUMNS: &str = "user_id, captured_at, time_of_day, day_of_week, \
     is_weekend, upcoming_events, location_class";

pub(crate) fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<ContextSnapshot> {
    Ok(ContextSnapshot {
        user_id: row.get(0)?,
        captured_at: get_ts(row, 1)?,
        time_of_day: get_enum(row, 2)?,
        day_of_week: row.get(3)?,
        is_weekend: row.get(4)?,
        upcoming_events: get_json(row, 5)?,
        location_class: row.get(6)?,
    })
}

/// Serialises a value for a JSON text column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ambia_core::AmbiaError> {
    serde_json::to_string(value).map_err(ambia_core::AmbiaError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_ordered() {
        let a = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(1500);
        assert_eq!(ts(a), "2026-03-02T08:00:00.000Z");
        assert_eq!(ts(a).len(), ts(b).len());
        assert!(ts(a) < ts(b));
    }
}
