// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions, one module per table family.

pub mod activity;
pub mod cache;
pub mod decisions;
pub mod patterns;
pub mod queue;
