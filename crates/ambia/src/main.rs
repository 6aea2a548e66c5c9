// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ambia - ambient predictive pre-computation.
//!
//! Binary entry point: the long-running `serve` loop plus one-shot commands
//! for each background job and for feeding activity and feedback in.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod commands;
mod serve;

use std::path::PathBuf;

use ambia_core::AmbiaError;
use ambia_core::types::Feedback;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::app::{App, Models};

/// Ambia - ambient predictive pre-computation.
#[derive(Parser, Debug)]
#[command(name = "ambia", version, about, long_about = None)]
struct Cli {
    /// Configuration file, replacing the standard search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run scan, sweep, pre-generation and maintenance on a schedule.
    Serve,
    /// Reason over recently active users and queue predictions.
    Scan,
    /// Claim and generate queued jobs once.
    Sweep,
    /// Pre-generate pages for the most valuable patterns.
    Pregenerate {
        /// Only this user; defaults to every recently active user.
        #[arg(long)]
        user: Option<String>,
    },
    /// Evict stale cache entries, expire old jobs and release dead leases.
    Maintain,
    /// Queue and cache counters, optionally with one user's patterns.
    Status {
        #[arg(long)]
        user: Option<String>,
    },
    /// Record feedback on a cached page.
    Feedback {
        #[arg(long)]
        user: String,
        #[arg(long)]
        cache_key: String,
        /// helpful, neutral or not_helpful
        #[arg(value_parser = parse_feedback)]
        feedback: Feedback,
    },
    /// Record one user action.
    Activity {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "query")]
        action: String,
        #[arg(long)]
        query: Option<String>,
        /// Component kinds shown with the action.
        #[arg(long = "shown", value_delimiter = ',')]
        components_shown: Vec<String>,
    },
}

fn parse_feedback(raw: &str) -> Result<Feedback, String> {
    raw.parse()
        .map_err(|_| format!("`{raw}` is not one of helpful, neutral, not_helpful"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AmbiaError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| AmbiaError::Internal(format!("failed to render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run(command: Commands, app: App) -> Result<(), AmbiaError> {
    match command {
        Commands::Serve => return serve::run_serve(app).await,
        Commands::Scan => {
            let report = app.orchestrator(Models::Required)?.scan_active_users().await?;
            print_json(&report)?;
        }
        Commands::Sweep => {
            let report = app
                .orchestrator(Models::Required)?
                .run_generation_sweep()
                .await?;
            print_json(&report)?;
        }
        Commands::Pregenerate { user } => {
            let content = app.content_generator()?;
            let orchestrator = app.orchestrator(Models::Required)?;
            let report =
                commands::pregenerate(&app, &orchestrator, &content, user.as_deref()).await?;
            print_json(&report)?;
        }
        Commands::Maintain => {
            let report = app.orchestrator(Models::NotNeeded)?.maintain().await?;
            print_json(&report)?;
        }
        Commands::Status { user } => {
            print_json(&commands::status(&app, user.as_deref()).await?)?;
        }
        Commands::Feedback {
            user,
            cache_key,
            feedback,
        } => {
            print_json(&commands::feedback(&app, &user, &cache_key, feedback).await?)?;
        }
        Commands::Activity {
            user,
            action,
            query,
            components_shown,
        } => {
            let record =
                commands::activity(&app, &user, &action, query, components_shown).await?;
            print_json(&record)?;
        }
    }
    app.close().await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => ambia_config::load_and_validate_path(path),
        None => ambia_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            ambia_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    serve::init_tracing(&config.service.log_level);

    let result = match App::open(config).await {
        Ok(app) => run(cli.command, app).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("ambia: {e}");
        std::process::exit(1);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    #[serial_test::serial]
    fn binary_loads_config_defaults() {
        let config = ambia_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.service.name, "ambia");
        assert_eq!(config.cadence.sweep_secs, 120);
    }

    #[test]
    fn parses_feedback_command() {
        let cli = Cli::try_parse_from([
            "ambia",
            "feedback",
            "--user",
            "u1",
            "--cache-key",
            "0123456789abcdef",
            "not_helpful",
        ])
        .unwrap();
        match cli.command {
            Commands::Feedback { feedback, .. } => assert_eq!(feedback, Feedback::NotHelpful),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(
            Cli::try_parse_from(["ambia", "feedback", "--user", "u", "--cache-key", "k", "meh"])
                .is_err()
        );
    }

    #[test]
    fn parses_activity_with_shown_components() {
        let cli = Cli::try_parse_from([
            "ambia",
            "--config",
            "/tmp/ambia.toml",
            "activity",
            "--user",
            "u1",
            "--query",
            "weather today",
            "--shown",
            "weather,calendar",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ambia.toml")));
        match cli.command {
            Commands::Activity {
                action,
                components_shown,
                ..
            } => {
                assert_eq!(action, "query");
                assert_eq!(components_shown, vec!["weather", "calendar"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
