// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recurring background work for Ambia.
//!
//! A [`Task`] is registered with a [`Scheduler`] at a fixed interval and
//! comes back as a [`TaskHandle`]. Cancelling the handle stops future runs;
//! a run already in progress is allowed to finish.
//!
//! [`TokioScheduler`] drives tasks from tokio timers. [`ManualScheduler`]
//! runs them only when told, for tests.

pub mod handle;
pub mod manual;
pub mod task;
pub mod tokio_scheduler;

use std::sync::Arc;
use std::time::Duration;

pub use handle::TaskHandle;
pub use manual::ManualScheduler;
pub use task::{FnTask, Task};
pub use tokio_scheduler::TokioScheduler;

/// Registers tasks to run at a fixed interval.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, every: Duration, task: Arc<dyn Task>) -> TaskHandle;
}
