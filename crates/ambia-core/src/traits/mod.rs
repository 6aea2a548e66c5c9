// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Everything that talks to the outside world (persistence, the generation
//! function, the pattern model, the context source) sits behind one of these
//! traits and uses `#[async_trait]` for dynamic dispatch.

pub mod adapter;
pub mod context;
pub mod generator;
pub mod pattern_model;
pub mod storage;

pub use adapter::PluginAdapter;
pub use context::ContextSource;
pub use generator::{ContentGenerator, GeneratedDocument, GenerationRequest};
pub use pattern_model::{DetectedPattern, PatternModel, PatternRequest};
pub use storage::StorageAdapter;
