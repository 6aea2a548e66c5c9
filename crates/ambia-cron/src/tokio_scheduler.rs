// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Scheduler, Task, TaskHandle};

/// Runs each task on its own tokio interval.
///
/// The first run happens one interval after scheduling. Ticks missed while a
/// run is in progress are skipped, so runs of one task never overlap.
/// Cancelling the parent token stops every task scheduled here.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    parent: CancellationToken,
}

impl TokioScheduler {
    pub fn new(parent: CancellationToken) -> Self {
        Self { parent }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, every: Duration, task: Arc<dyn Task>) -> TaskHandle {
        let token = self.parent.child_token();
        let cancel = token.clone();
        let name = task.name().to_string();

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        debug!(task = task.name(), "scheduled run starting");
                        if let Err(e) = task.run().await {
                            warn!(task = task.name(), error = %e, "scheduled run failed");
                        }
                    }
                }
            }
            debug!(task = task.name(), "schedule loop exited");
        });

        info!(task = %name, every_secs = every.as_secs(), "task scheduled");
        TaskHandle::new(name, every, token, Some(join))
    }
}
