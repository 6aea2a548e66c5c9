// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pattern-driven reasoning for Ambia.
//!
//! The [`Reasoner`] reads recent activity from storage, calls a black-box
//! [`PatternModel`](ambia_core::PatternModel) and turns its detections into
//! [`CandidatePrediction`](ambia_core::types::CandidatePrediction)s, keeping the
//! behaviour-pattern aggregate and the reasoning audit trail up to date.

pub mod candidates;
pub mod reasoner;

pub use candidates::{CandidatePolicy, build_candidates, pattern_name, urgency};
pub use reasoner::{Reasoner, ReasonerSettings, Reasoning};
