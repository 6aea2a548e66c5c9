// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only source of user activity and context.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AmbiaError;
use crate::types::{ActivityRecord, ContextSnapshot};

/// Supplies activity history and point-in-time context to the reasoner and generator.
#[async_trait]
pub trait ContextSource: Send + Sync + 'static {
    /// Activity for `user_id` at or after `since`, newest first, at most `limit` rows.
    async fn recent_activity(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, AmbiaError>;

    /// The most recently captured snapshot for `user_id`, if any.
    async fn latest_snapshot(&self, user_id: &str)
    -> Result<Option<ContextSnapshot>, AmbiaError>;
}
