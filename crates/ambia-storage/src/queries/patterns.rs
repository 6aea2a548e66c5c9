// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Learned behaviour patterns, upserted by `(user_id, pattern_name)`.

use ambia_core::AmbiaError;
use ambia_core::types::{BehaviorPattern, PatternObservation};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{PATTERN_COLUMNS, pattern_from_row, to_json, ts};

/// Success rate a new pattern starts from.
pub const INITIAL_SUCCESS_RATE: f64 = 0.5;

/// Inserts the pattern or folds the observation into it: occurrences + 1 and
/// `confidence += alpha * (observed - confidence)`. Last writer wins.
pub async fn observe(
    db: &Database,
    observation: &PatternObservation,
    alpha: f64,
    now: DateTime<Utc>,
) -> Result<(), AmbiaError> {
    let user_id = observation.user_id.clone();
    let pattern_type = observation.pattern_type.to_string();
    let pattern_name = observation.pattern_name.clone();
    let conditions = to_json(&observation.conditions)?;
    let confidence = observation.confidence.clamp(0.0, 1.0);
    let now_s = ts(now);

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO user_behavior_patterns (user_id, pattern_type, pattern_name,
                    conditions, confidence_score, occurrences, success_rate, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
                 ON CONFLICT(user_id, pattern_name) DO UPDATE SET
                    pattern_type = excluded.pattern_type,
                    conditions = excluded.conditions,
                    confidence_score = confidence_score
                        + ?8 * (excluded.confidence_score - confidence_score),
                    occurrences = occurrences + 1,
                    updated_at = excluded.updated_at",
                params![
                    user_id,
                    pattern_type,
                    pattern_name,
                    conditions,
                    confidence,
                    INITIAL_SUCCESS_RATE,
                    now_s,
                    alpha,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Moves `success_rate` toward 1 (success) or 0 by `alpha`.
pub async fn record_outcome(
    db: &Database,
    user_id: &str,
    pattern_name: &str,
    success: bool,
    alpha: f64,
    now: DateTime<Utc>,
) -> Result<bool, AmbiaError> {
    let user_id = user_id.to_string();
    let pattern_name = pattern_name.to_string();
    let target = if success { 1.0 } else { 0.0 };
    let now_s = ts(now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE user_behavior_patterns
                 SET success_rate = success_rate + ?3 * (?4 - success_rate), updated_at = ?5
                 WHERE user_id = ?1 AND pattern_name = ?2",
                params![user_id, pattern_name, alpha, target, now_s],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Highest `confidence_score * success_rate` first.
pub async fn top(
    db: &Database,
    user_id: &str,
    limit: usize,
) -> Result<Vec<BehaviorPattern>, AmbiaError> {
    let user_id = user_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let sql = format!(
        "SELECT {PATTERN_COLUMNS} FROM user_behavior_patterns
         WHERE user_id = ?1
         ORDER BY confidence_score * success_rate DESC, updated_at DESC, pattern_name ASC
         LIMIT ?2"
    );
    db.connection()
        .call(move |conn| -> Result<Vec<BehaviorPattern>, rusqlite::Error> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id, limit], pattern_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(
    db: &Database,
    user_id: &str,
    pattern_name: &str,
) -> Result<Option<BehaviorPattern>, AmbiaError> {
    let user_id = user_id.to_string();
    let pattern_name = pattern_name.to_string();
    let sql = format!(
        "SELECT {PATTERN_COLUMNS} FROM user_behavior_patterns
         WHERE user_id = ?1 AND pattern_name = ?2"
    );
    db.connection()
        .call(move |conn| -> Result<Option<BehaviorPattern>, rusqlite::Error> {
            conn.query_row(&sql, params![user_id, pattern_name], pattern_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}
