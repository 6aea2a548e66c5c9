// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only reasoning audit trail.

use ambia_core::AmbiaError;
use ambia_core::types::ReasoningDecision;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{DECISION_COLUMNS, decision_from_row, sql_u64, to_json, ts};

pub async fn record(db: &Database, decision: &ReasoningDecision) -> Result<(), AmbiaError> {
    let id = decision.id.clone();
    let user_id = decision.user_id.clone();
    let snapshot = to_json(&decision.context_snapshot)?;
    let decision_type = decision.decision_type.to_string();
    let priority = decision.priority;
    let urgency = decision.urgency.to_string();
    let reasoning = decision.reasoning.clone();
    let candidate_count = decision.candidate_count;
    let duration_ms = sql_u64(decision.duration_ms);
    let created_at = ts(decision.created_at);

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO reasoning_decisions (id, user_id, context_snapshot, decision_type,
                    priority, urgency, reasoning, candidate_count, duration_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    user_id,
                    snapshot,
                    decision_type,
                    priority,
                    urgency,
                    reasoning,
                    candidate_count,
                    duration_ms,
                    created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn recent(
    db: &Database,
    user_id: &str,
    limit: usize,
) -> Result<Vec<ReasoningDecision>, AmbiaError> {
    let user_id = user_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let sql = format!(
        "SELECT {DECISION_COLUMNS} FROM reasoning_decisions
         WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2"
    );
    db.connection()
        .call(move |conn| -> Result<Vec<ReasoningDecision>, rusqlite::Error> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id, limit], decision_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}
