// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result cache rows in `page_cache`, keyed by `(user_id, cache_key)`.

use ambia_core::AmbiaError;
use ambia_core::types::{CacheEntry, CachePut, CacheStats, Feedback, FeedbackTuning, SweepPolicy};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{CACHE_COLUMNS, cache_entry_from_row, sql_u64, to_json, ts};

/// Returns a valid entry, bumping `access_count`, `last_accessed` and
/// `was_shown` in the same statement.
pub async fn get(
    db: &Database,
    user_id: &str,
    cache_key: &str,
    now: DateTime<Utc>,
) -> Result<Option<CacheEntry>, AmbiaError> {
    let user_id = user_id.to_string();
    let cache_key = cache_key.to_string();
    let now_s = ts(now);
    let sql = format!(
        "UPDATE page_cache
         SET access_count = access_count + 1, last_accessed = ?3, was_shown = 1
         WHERE user_id = ?1 AND cache_key = ?2 AND valid_until > ?3
         RETURNING {CACHE_COLUMNS}"
    );
    db.connection()
        .call(move |conn| -> Result<Option<CacheEntry>, rusqlite::Error> {
            conn.query_row(&sql, params![user_id, cache_key, now_s], cache_entry_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Same validity rule as [`get`], read-only.
pub async fn peek(
    db: &Database,
    user_id: &str,
    cache_key: &str,
    now: DateTime<Utc>,
) -> Result<Option<CacheEntry>, AmbiaError> {
    let user_id = user_id.to_string();
    let cache_key = cache_key.to_string();
    let now_s = ts(now);
    let sql = format!(
        "SELECT {CACHE_COLUMNS} FROM page_cache
         WHERE user_id = ?1 AND cache_key = ?2 AND valid_until > ?3"
    );
    db.connection()
        .call(move |conn| -> Result<Option<CacheEntry>, rusqlite::Error> {
            conn.query_row(&sql, params![user_id, cache_key, now_s], cache_entry_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Upserts an entry. An overwrite replaces payload, metadata, `created_at`
/// and `valid_until`, resets feedback and `was_shown`, and keeps the access
/// history.
pub async fn put(
    db: &Database,
    user_id: &str,
    cache_key: &str,
    entry: &CachePut,
    now: DateTime<Utc>,
) -> Result<(), AmbiaError> {
    let user_id = user_id.to_string();
    let cache_key = cache_key.to_string();
    let cache_type = entry.cache_type.to_string();
    let source_query = entry.source_query.clone();
    let payload = to_json(&entry.payload)?;
    let relevance = entry.relevance_score.clamp(0.0, 1.0);
    let triggers = to_json(&entry.trigger_conditions)?;
    let now_s = ts(now);
    let valid_until = ts(entry.valid_until);
    let cost_tokens = entry.generation_cost_tokens;
    let time_ms = entry.generation_time_ms.map(sql_u64);

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO page_cache (
                    user_id, cache_key, cache_type, source_query, payload, relevance_score,
                    trigger_conditions, created_at, valid_until, generation_cost_tokens,
                    generation_time_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(user_id, cache_key) DO UPDATE SET
                    cache_type = excluded.cache_type,
                    source_query = excluded.source_query,
                    payload = excluded.payload,
                    relevance_score = excluded.relevance_score,
                    trigger_conditions = excluded.trigger_conditions,
                    created_at = excluded.created_at,
                    valid_until = excluded.valid_until,
                    generation_cost_tokens = excluded.generation_cost_tokens,
                    generation_time_ms = excluded.generation_time_ms,
                    user_feedback = NULL,
                    was_shown = 0",
                params![
                    user_id,
                    cache_key,
                    cache_type,
                    source_query,
                    payload,
                    relevance,
                    triggers,
                    now_s,
                    valid_until,
                    cost_tokens,
                    time_ms,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn invalidate(db: &Database, user_id: &str, cache_key: &str) -> Result<bool, AmbiaError> {
    let user_id = user_id.to_string();
    let cache_key = cache_key.to_string();
    let deleted = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM page_cache WHERE user_id = ?1 AND cache_key = ?2",
                params![user_id, cache_key],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(deleted == 1)
}

/// Stores feedback and adjusts relevance in one statement. Applies to
/// expired entries too, since feedback often arrives late.
pub async fn record_feedback(
    db: &Database,
    user_id: &str,
    cache_key: &str,
    feedback: Feedback,
    tuning: &FeedbackTuning,
) -> Result<Option<CacheEntry>, AmbiaError> {
    let user_id = user_id.to_string();
    let cache_key = cache_key.to_string();
    let feedback = feedback.to_string();
    let boost = tuning.helpful_boost;
    let factor = tuning.not_helpful_factor;
    let sql = format!(
        "UPDATE page_cache
         SET user_feedback = ?3,
             relevance_score = CASE ?3
                 WHEN 'helpful' THEN MIN(1.0, relevance_score + ?4)
                 WHEN 'not_helpful' THEN relevance_score * ?5
                 ELSE relevance_score END
         WHERE user_id = ?1 AND cache_key = ?2
         RETURNING {CACHE_COLUMNS}"
    );
    db.connection()
        .call(move |conn| -> Result<Option<CacheEntry>, rusqlite::Error> {
            conn.query_row(
                &sql,
                params![user_id, cache_key, feedback, boost, factor],
                cache_entry_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// One DELETE evaluated at delete time against the policy thresholds.
pub async fn sweep(db: &Database, policy: &SweepPolicy) -> Result<u64, AmbiaError> {
    let expired_before = ts(policy.expired_before);
    let unused_before = ts(policy.unused_created_before);
    let floor = policy.relevance_floor;
    let deleted = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM page_cache
                 WHERE valid_until < ?1
                    OR (access_count = 0 AND created_at < ?2)
                    OR relevance_score < ?3",
                params![expired_before, unused_before, floor],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(deleted as u64)
}

/// Counters across all users, or one user when `user_id` is given.
pub async fn stats(
    db: &Database,
    user_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CacheStats, AmbiaError> {
    let user_id = user_id.map(str::to_string);
    let now_s = ts(now);
    let row = db
        .connection()
        .call(move |conn| -> Result<[i64; 5], rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(valid_until > ?2), 0),
                        COALESCE(SUM(access_count), 0),
                        COALESCE(SUM(user_feedback = 'helpful'), 0),
                        COALESCE(SUM(user_feedback = 'not_helpful'), 0)
                 FROM page_cache
                 WHERE ?1 IS NULL OR user_id = ?1",
                params![user_id, now_s],
                |row| {
                    Ok([
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ])
                },
            )
        })
        .await
        .map_err(map_tr_err)?;

    let [entries, valid_entries, total_accesses, helpful, not_helpful] =
        row.map(|v| u64::try_from(v).unwrap_or(0));
    Ok(CacheStats {
        entries,
        valid_entries,
        total_accesses,
        helpful,
        not_helpful,
    })
}
