// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Ambia prediction pipeline.
//!
//! Error type, domain types, the component document schema, cache key
//! derivation, the clock abstraction and the adapter traits every other
//! crate in the workspace builds on.

pub mod activity;
pub mod clock;
pub mod component;
pub mod error;
pub mod fingerprint;
pub mod traits;
pub mod types;

pub use activity::ActivitySummary;
pub use clock::{Clock, ManualClock, SystemClock};
pub use component::{Component, ComponentBody, ComponentPriority, parse_document};
pub use error::{AmbiaError, MAX_ERROR_MESSAGE_LEN, truncate_message};
pub use fingerprint::fingerprint;
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    ContentGenerator, ContextSource, DetectedPattern, GeneratedDocument, GenerationRequest,
    PatternModel, PatternRequest, PluginAdapter, StorageAdapter,
};
