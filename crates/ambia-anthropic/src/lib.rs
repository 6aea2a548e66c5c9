// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API content generator for Ambia.
//!
//! Implements [`ContentGenerator`]: the rendered prompt goes out as a single
//! user message and the reply text is parsed as the component document.
//! Schema validation of the document happens in the pipeline, not here.

pub mod client;
pub mod types;

use ambia_config::model::AnthropicConfig;
use ambia_core::types::{AdapterType, HealthStatus};
use ambia_core::{AmbiaError, ContentGenerator, GeneratedDocument, GenerationRequest, PluginAdapter};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

const SYSTEM_PROMPT: &str = "You build UI components for a personal assistant. \
Respond with ONLY valid JSON: either an array of components or an object with a \
\"components\" array. No prose, no markdown.";

pub struct AnthropicGenerator {
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl AnthropicGenerator {
    /// API key resolution: `anthropic.api_key`, then `ANTHROPIC_API_KEY`.
    pub fn new(config: &AnthropicConfig) -> Result<Self, AmbiaError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = AnthropicClient::new(&api_key, &config.api_version, &config.base_url)?;
        info!(model = %config.model, "Anthropic generator initialized");
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: AnthropicClient, config: &AnthropicConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn to_message_request(&self, request: &GenerationRequest) -> MessageRequest {
        MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: Some(SYSTEM_PROMPT.to_string()),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: request.prompt.clone(),
            }],
        }
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, AmbiaError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.to_string());
    }

    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        AmbiaError::Config(
            "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
        )
    })
}

/// Strips a surrounding markdown code fence, if any, and parses the rest.
fn parse_reply(text: &str) -> Result<Value, AmbiaError> {
    let trimmed = text.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(fenced) => {
            let after_lang = fenced.split_once('\n').map_or("", |(_, rest)| rest);
            after_lang.trim_end().trim_end_matches("```")
        }
        None => trimmed,
    };
    serde_json::from_str(body.trim())
        .map_err(|e| AmbiaError::SchemaValidation(format!("reply is not valid JSON: {e}")))
}

#[async_trait]
impl PluginAdapter for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
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
        debug!("Anthropic generator shutting down");
        Ok(())
    }
}

#[async_trait]
impl ContentGenerator for AnthropicGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedDocument, AmbiaError> {
        let response = self
            .client
            .complete_message(&self.to_message_request(request))
            .await?;
        debug!(
            user_id = %request.user_id,
            message_id = %response.id,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "generation reply received"
        );

        Ok(GeneratedDocument {
            document: parse_reply(&response.text())?,
            tokens_used: Some(response.total_tokens()),
        })
    }
}
