// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The injected generation function.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AmbiaError;
use crate::traits::adapter::PluginAdapter;

/// Everything a generator needs to produce one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub user_id: String,
    pub query: String,
    pub predicted_need: String,
    /// Structured context (activity summary, job context, current time).
    pub context: serde_json::Value,
    /// Fully rendered prompt text.
    pub prompt: String,
}

/// Raw generator output. Validation against the component set happens later.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDocument {
    pub document: serde_json::Value,
    pub tokens_used: Option<u32>,
}

/// Produces a component document for a request.
///
/// Implementations return transient failures as [`AmbiaError::Generation`]
/// and may return any JSON; callers validate the shape.
#[async_trait]
pub trait ContentGenerator: PluginAdapter {
    async fn generate(&self, request: &GenerationRequest)
    -> Result<GeneratedDocument, AmbiaError>;
}
