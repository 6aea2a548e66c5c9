// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Ambia integration tests.
//!
//! - [`MockGenerator`] - scripted content generator with call counting
//! - [`MockPatternModel`] - pattern model returning canned detections
//! - [`TestHarness`] - temp SQLite storage, manual clock and default config

pub mod harness;
pub mod mock_generator;
pub mod mock_pattern_model;

pub use harness::{TestHarness, default_start};
pub use mock_generator::{MockGenerator, MockReply, sample_document};
pub use mock_pattern_model::{MockPatternModel, detected};
