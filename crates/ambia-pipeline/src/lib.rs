// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Ambia pipeline: generation scheduler, generator worker, result cache
//! and the orchestrator that coordinates them.
//!
//! Data flows reasoner -> [`GenerationScheduler`] -> [`Generator`] ->
//! [`ResultCache`]; the [`Orchestrator`] also reads and writes the cache
//! directly for on-demand requests, coalescing concurrent duplicates.

pub mod cache;
pub mod coalesce;
pub mod generator;
pub mod orchestrator;
pub mod prompt;
pub mod scheduler;

pub use cache::{CacheSettings, ResultCache};
pub use generator::{GeneratedPage, Generator, GeneratorSettings, JobOutcome, SweepReport};
pub use orchestrator::{
    Orchestrator, OrchestratorSettings, PlanDecision, PlannedPage, PregenerateResult, ScanReport,
    ThinkPlan,
};
pub use scheduler::{Admission, GenerationScheduler, QueueSettings};
