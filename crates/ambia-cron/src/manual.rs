// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ambia_core::AmbiaError;
use tokio_util::sync::CancellationToken;

use crate::{Scheduler, Task, TaskHandle};

struct Registration {
    every: Duration,
    task: Arc<dyn Task>,
    token: CancellationToken,
}

/// Records schedules and runs tasks only on [`ManualScheduler::run_due`] or
/// [`ManualScheduler::run_named`].
#[derive(Default)]
pub struct ManualScheduler {
    registrations: Mutex<Vec<Registration>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> Vec<(Duration, Arc<dyn Task>)> {
        let registrations = self.registrations.lock().unwrap_or_else(|e| e.into_inner());
        registrations
            .iter()
            .filter(|r| !r.token.is_cancelled())
            .map(|r| (r.every, r.task.clone()))
            .collect()
    }

    /// Names and intervals of the tasks that are still scheduled.
    pub fn scheduled(&self) -> Vec<(String, Duration)> {
        self.live()
            .into_iter()
            .map(|(every, task)| (task.name().to_string(), every))
            .collect()
    }

    /// Runs every live task whose interval divides `elapsed`, in
    /// registration order, and returns each run's result by name.
    pub async fn run_due(&self, elapsed: Duration) -> Vec<(String, Result<(), AmbiaError>)> {
        let mut results = Vec::new();
        for (every, task) in self.live() {
            if every.is_zero() || elapsed.as_millis() % every.as_millis() != 0 {
                continue;
            }
            results.push((task.name().to_string(), task.run().await));
        }
        results
    }

    /// Runs live tasks called `name` once. `None` if there is none.
    pub async fn run_named(&self, name: &str) -> Option<Result<(), AmbiaError>> {
        let mut outcome = None;
        for (_, task) in self.live() {
            if task.name() == name {
                outcome = Some(task.run().await);
            }
        }
        outcome
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, every: Duration, task: Arc<dyn Task>) -> TaskHandle {
        let token = CancellationToken::new();
        let name = task.name().to_string();
        self.registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Registration {
                every,
                task,
                token: token.clone(),
            });
        TaskHandle::new(name, every, token, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnTask;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(name: &str, runs: Arc<AtomicUsize>) -> Arc<dyn Task> {
        Arc::new(FnTask::new(name, move || {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn runs_only_due_tasks() {
        let scheduler = ManualScheduler::new();
        let scans = Arc::new(AtomicUsize::new(0));
        let sweeps = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(Duration::from_secs(300), counting("scan", scans.clone()));
        scheduler.schedule(Duration::from_secs(120), counting("sweep", sweeps.clone()));

        let ran = scheduler.run_due(Duration::from_secs(600)).await;
        let names: Vec<_> = ran.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["scan", "sweep"]);

        scheduler.run_due(Duration::from_secs(240)).await;
        assert_eq!(scans.load(Ordering::SeqCst), 1);
        assert_eq!(sweeps.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_tasks_no_longer_run() {
        let scheduler = ManualScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule(Duration::from_secs(60), counting("maintain", runs.clone()));

        assert!(scheduler.run_named("maintain").await.unwrap().is_ok());
        handle.cancel();
        assert!(scheduler.run_named("maintain").await.is_none());
        assert!(scheduler.scheduled().is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        handle.shutdown().await;
    }
}
