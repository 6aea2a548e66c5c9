// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate view of a user's recent activity, fed to the pattern model and
//! to generation prompts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ActivityRecord;

/// Distributions and recent queries over a window of activity records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub total_actions: u64,
    pub action_types: BTreeMap<String, u64>,
    pub time_of_day: BTreeMap<String, u64>,
    pub day_of_week: BTreeMap<String, u64>,
    /// Most recent first, deduplicated case-insensitively.
    pub recent_queries: Vec<String>,
}

impl ActivitySummary {
    /// Summarises `records`, which are expected newest first.
    pub fn from_records(records: &[ActivityRecord], max_queries: usize) -> Self {
        let mut summary = ActivitySummary {
            total_actions: records.len() as u64,
            ..Default::default()
        };

        for record in records {
            *summary
                .action_types
                .entry(record.action_type.clone())
                .or_default() += 1;
            *summary
                .time_of_day
                .entry(record.time_of_day.to_string())
                .or_default() += 1;
            *summary
                .day_of_week
                .entry(record.day_of_week.clone())
                .or_default() += 1;

            if summary.recent_queries.len() >= max_queries {
                continue;
            }
            let Some(query) = record.query.as_deref().map(str::trim) else {
                continue;
            };
            let seen = summary
                .recent_queries
                .iter()
                .any(|q| q.eq_ignore_ascii_case(query));
            if !query.is_empty() && !seen {
                summary.recent_queries.push(query.to_string());
            }
        }

        summary
    }

    pub fn is_empty(&self) -> bool {
        self.total_actions == 0
    }
}
