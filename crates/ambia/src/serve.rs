// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ambia serve`: runs the four background jobs at their configured cadence
//! until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use ambia_config::model::CadenceConfig;
use ambia_core::{AmbiaError, ContentGenerator};
use ambia_cron::{FnTask, Scheduler, TaskHandle, TokioScheduler};
use ambia_pipeline::Orchestrator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::{App, Models};
use crate::commands;

pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ambia={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// Returns a token cancelled on SIGINT or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT, shutting down"),
                        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable, listening for SIGINT only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, shutting down");
        }

        trigger.cancel();
        debug!("signal handler completed");
    });

    token
}

/// Registers scan, sweep, pre-generation and maintenance with `scheduler`.
pub fn schedule_jobs(
    scheduler: &dyn Scheduler,
    cadence: &CadenceConfig,
    app: Arc<App>,
    orchestrator: Arc<Orchestrator>,
    content: Arc<dyn ContentGenerator>,
) -> Vec<TaskHandle> {
    let scan = {
        let orchestrator = orchestrator.clone();
        FnTask::new("pattern-scan", move || {
            let orchestrator = orchestrator.clone();
            async move { orchestrator.scan_active_users().await.map(|_| ()) }
        })
    };
    let sweep = {
        let orchestrator = orchestrator.clone();
        FnTask::new("generation-sweep", move || {
            let orchestrator = orchestrator.clone();
            async move { orchestrator.run_generation_sweep().await.map(|_| ()) }
        })
    };
    let pregenerate = {
        let orchestrator = orchestrator.clone();
        FnTask::new("pregenerate", move || {
            let (app, orchestrator, content) = (app.clone(), orchestrator.clone(), content.clone());
            async move {
                commands::pregenerate(&app, &orchestrator, &content, None)
                    .await
                    .map(|_| ())
            }
        })
    };
    let maintain = FnTask::new("maintenance", move || {
        let orchestrator = orchestrator.clone();
        async move { orchestrator.maintain().await.map(|_| ()) }
    });

    vec![
        scheduler.schedule(Duration::from_secs(cadence.scan_secs), Arc::new(scan)),
        scheduler.schedule(Duration::from_secs(cadence.sweep_secs), Arc::new(sweep)),
        scheduler.schedule(
            Duration::from_secs(cadence.pregenerate_secs),
            Arc::new(pregenerate),
        ),
        scheduler.schedule(Duration::from_secs(cadence.maintain_secs), Arc::new(maintain)),
    ]
}

pub async fn run_serve(app: App) -> Result<(), AmbiaError> {
    let app = Arc::new(app);
    let content = app.content_generator()?;
    let orchestrator = Arc::new(app.orchestrator(Models::Required)?);

    let shutdown = install_signal_handler();
    let scheduler = TokioScheduler::new(shutdown.clone());
    let handles = schedule_jobs(
        &scheduler,
        &app.config.cadence,
        app.clone(),
        orchestrator,
        content,
    );
    info!(worker_id = %app.worker_id, tasks = handles.len(), "ambia serving");

    shutdown.cancelled().await;
    for handle in handles {
        handle.shutdown().await;
    }
    app.close().await?;
    info!("ambia stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_config;
    use ambia_cron::ManualScheduler;
    use ambia_test_utils::MockGenerator;

    #[test]
    fn signal_token_starts_uncancelled() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let token = install_signal_handler();
            assert!(!token.is_cancelled());
            token.cancel();
        });
    }

    #[tokio::test]
    async fn all_jobs_registered_at_their_cadence() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = Arc::new(App::open(temp_config(&dir)).await.unwrap());
        let orchestrator = Arc::new(app.orchestrator(Models::NotNeeded).unwrap());
        let content: Arc<dyn ContentGenerator> = Arc::new(MockGenerator::new());
        let scheduler = ManualScheduler::new();

        let handles = schedule_jobs(
            &scheduler,
            &app.config.cadence,
            app.clone(),
            orchestrator,
            content,
        );
        assert_eq!(handles.len(), 4);
        assert_eq!(
            scheduler.scheduled(),
            vec![
                ("pattern-scan".to_string(), Duration::from_secs(300)),
                ("generation-sweep".to_string(), Duration::from_secs(120)),
                ("pregenerate".to_string(), Duration::from_secs(3600)),
                ("maintenance".to_string(), Duration::from_secs(86_400)),
            ]
        );

        // Empty database: every job succeeds without touching a model.
        for (name, result) in scheduler.run_due(Duration::from_secs(86_400 * 3600)).await {
            assert!(result.is_ok(), "{name} failed: {result:?}");
        }
    }
}
