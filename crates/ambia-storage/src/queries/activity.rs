// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Activity log and context snapshots.

use ambia_core::AmbiaError;
use ambia_core::types::{ActivityRecord, ContextSnapshot};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{
    ACTIVITY_COLUMNS, SNAPSHOT_COLUMNS, activity_from_row, snapshot_from_row, to_json, ts,
};

pub async fn record(db: &Database, record: &ActivityRecord) -> Result<(), AmbiaError> {
    let user_id = record.user_id.clone();
    let action_type = record.action_type.clone();
    let query = record.query.clone();
    let shown = to_json(&record.components_shown)?;
    let interacted = record.component_interacted.clone();
    let time_of_day = record.time_of_day.to_string();
    let day_of_week = record.day_of_week.clone();
    let is_weekend = record.is_weekend;
    let timestamp = ts(record.timestamp);

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO activity_log (user_id, action_type, query, components_shown,
                    component_interacted, time_of_day, day_of_week, is_weekend, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user_id,
                    action_type,
                    query,
                    shown,
                    interacted,
                    time_of_day,
                    day_of_week,
                    is_weekend,
                    timestamp,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Newest first, at most `limit` rows at or after `since`.
pub async fn recent(
    db: &Database,
    user_id: &str,
    since: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<ActivityRecord>, AmbiaError> {
    let user_id = user_id.to_string();
    let since = ts(since);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let sql = format!(
        "SELECT {ACTIVITY_COLUMNS} FROM activity_log
         WHERE user_id = ?1 AND timestamp >= ?2
         ORDER BY timestamp DESC, id DESC
         LIMIT ?3"
    );
    db.connection()
        .call(move |conn| -> Result<Vec<ActivityRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id, since, limit], activity_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Distinct users with any activity at or after `since`, sorted.
pub async fn active_users(db: &Database, since: DateTime<Utc>) -> Result<Vec<String>, AmbiaError> {
    let since = ts(since);
    db.connection()
        .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT user_id FROM activity_log WHERE timestamp >= ?1 ORDER BY user_id",
            )?;
            let rows = stmt
                .query_map(params![since], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn record_snapshot(db: &Database, snapshot: &ContextSnapshot) -> Result<(), AmbiaError> {
    let user_id = snapshot.user_id.clone();
    let captured_at = ts(snapshot.captured_at);
    let time_of_day = snapshot.time_of_day.to_string();
    let day_of_week = snapshot.day_of_week.clone();
    let is_weekend = snapshot.is_weekend;
    let events = to_json(&snapshot.upcoming_events)?;
    let location = snapshot.location_class.clone();

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO context_snapshots (user_id, captured_at, time_of_day, day_of_week,
                    is_weekend, upcoming_events, location_class)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user_id,
                    captured_at,
                    time_of_day,
                    day_of_week,
                    is_weekend,
                    events,
                    location
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn latest_snapshot(
    db: &Database,
    user_id: &str,
) -> Result<Option<ContextSnapshot>, AmbiaError> {
    let user_id = user_id.to_string();
    let sql = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM context_snapshots
         WHERE user_id = ?1 ORDER BY captured_at DESC, id DESC LIMIT 1"
    );
    db.connection()
        .call(move |conn| -> Result<Option<ContextSnapshot>, rusqlite::Error> {
            conn.query_row(&sql, params![user_id], snapshot_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}
