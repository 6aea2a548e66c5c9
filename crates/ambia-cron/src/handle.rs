// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cancellation handle for a scheduled task.
///
/// Dropping the handle does not cancel the task; call [`TaskHandle::cancel`]
/// or cancel the scheduler's parent token.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    every: Duration,
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub(crate) fn new(
        name: impl Into<String>,
        every: Duration,
        token: CancellationToken,
        join: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            name: name.into(),
            every,
            token,
            join,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.every
    }

    /// Stops future runs.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels and waits for an in-progress run to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take()
            && let Err(e) = join.await
        {
            warn!(task = %self.name, error = %e, "scheduled task ended abnormally");
        }
        debug!(task = %self.name, "scheduled task stopped");
    }
}
