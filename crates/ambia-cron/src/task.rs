// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::future::Future;
use std::marker::PhantomData;

use ambia_core::AmbiaError;
use async_trait::async_trait;

/// A unit of recurring work.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Used in logs.
    fn name(&self) -> &str;

    /// One run. Errors are logged by the scheduler and the task stays scheduled.
    async fn run(&self) -> Result<(), AmbiaError>;
}

/// Adapts an async closure into a [`Task`].
pub struct FnTask<F, Fut> {
    name: String,
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnTask<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AmbiaError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _fut: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AmbiaError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), AmbiaError> {
        (self.f)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn closure_tasks_run_their_body() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = FnTask::new("count", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        assert_eq!(task.name(), "count");
        task.run().await.unwrap();
        task.run().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
