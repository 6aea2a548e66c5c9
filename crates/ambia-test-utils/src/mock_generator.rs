// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock content generator for deterministic pipeline tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ambia_core::types::{AdapterType, HealthStatus};
use ambia_core::{AmbiaError, ContentGenerator, GeneratedDocument, GenerationRequest, PluginAdapter};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockReply {
    Document(Value),
    /// Fails with a retryable generation error.
    Transient(String),
    /// Fails with a permanent job error.
    Permanent(String),
    /// Never answers; only a timeout ends the call.
    Hang,
}

/// A generator that pops replies from a FIFO queue and falls back to
/// [`sample_document`] when the queue is empty.
pub struct MockGenerator {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Sleeps for `delay` before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// A small valid document with one weather and one tasks component.
pub fn sample_document() -> Value {
    json!([
        {"type": "weather", "title": "Today", "priority": "high", "data": {"temp_f": 61, "summary": "clear"}},
        {"type": "tasks", "data": {"items": ["standup", "review"]}}
    ])
}

#[async_trait]
impl PluginAdapter for MockGenerator {
    fn name(&self) -> &str {
        "mock-generator"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generator
    }

    async fn health_check(&self) -> Result<HealthStatus, AmbiaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AmbiaError> {
        Ok(())
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedDocument, AmbiaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        let reply = self.replies.lock().await.pop_front();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match reply.unwrap_or_else(|| MockReply::Document(sample_document())) {
            MockReply::Document(document) => Ok(GeneratedDocument {
                document,
                tokens_used: Some(42),
            }),
            MockReply::Transient(message) => Err(AmbiaError::Generation {
                message,
                source: None,
            }),
            MockReply::Permanent(reason) => Err(AmbiaError::PermanentJob {
                job_id: String::new(),
                reason,
            }),
            MockReply::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            user_id: "u1".into(),
            query: "weather".into(),
            predicted_need: "weather".into(),
            context: json!({}),
            prompt: "prompt".into(),
        }
    }

    #[tokio::test]
    async fn scripted_replies_then_default() {
        let generator = MockGenerator::with_replies(vec![MockReply::Transient("boom".into())]);
        assert!(generator.generate(&request()).await.is_err());
        let doc = generator.generate(&request()).await.unwrap();
        assert_eq!(doc.document, sample_document());
        assert_eq!(generator.calls(), 2);
        assert_eq!(generator.requests().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hang_only_ends_by_timeout() {
        let generator = MockGenerator::with_replies(vec![MockReply::Hang]);
        let result =
            tokio::time::timeout(Duration::from_secs(5), generator.generate(&request())).await;
        assert!(result.is_err());
    }
}
