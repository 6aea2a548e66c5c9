// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pattern model backed by an OpenAI-compatible chat-completions endpoint
//! (Together, OpenAI, a local server).
//!
//! The model is asked for a JSON object `{"patterns": [...]}`. Items that do
//! not deserialize are dropped individually; only a reply that is not JSON
//! at all fails the call.

pub mod client;
pub mod types;

use std::time::Duration;

use ambia_config::model::PatternModelConfig;
use ambia_core::types::{AdapterType, HealthStatus};
use ambia_core::{AmbiaError, DetectedPattern, PatternModel, PatternRequest, PluginAdapter};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::ChatClient;
use crate::types::{ChatMessage, ChatRequest, ResponseFormat};

const SYSTEM_PROMPT: &str = "You are a pattern detection AI. Always respond with valid JSON.";

pub struct OpenAiPatternModel {
    client: ChatClient,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiPatternModel {
    /// API key resolution: `pattern_model.api_key`, then `TOGETHER_API_KEY`.
    pub fn new(config: &PatternModelConfig) -> Result<Self, AmbiaError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = ChatClient::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(model = %config.model, base_url = %config.base_url, "pattern model initialized");
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: ChatClient, config: &PatternModelConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn to_chat_request(&self, request: &PatternRequest) -> Result<ChatRequest, AmbiaError> {
        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(render_prompt(request)?),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: ResponseFormat::json_object(),
        })
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, AmbiaError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.to_string());
    }

    std::env::var("TOGETHER_API_KEY").map_err(|_| {
        AmbiaError::Config(
            "pattern model API key not found. Set pattern_model.api_key in config or TOGETHER_API_KEY environment variable.".into(),
        )
    })
}

fn render_prompt(request: &PatternRequest) -> Result<String, AmbiaError> {
    let summary = to_pretty_json(&request.summary)?;
    let snapshot = to_pretty_json(&request.snapshot)?;
    Ok(format!(
        "You are a pattern detection AI for Ambia. Analyze this user's activity and detect behavioral patterns.

USER ACTIVITY SUMMARY:
{summary}

CURRENT CONTEXT:
{snapshot}

For each pattern you detect give its type (time_based, query_based, event_based), \
your confidence (0.0 to 1.0), what the user will likely do next and when.
Only include patterns with confidence >= {min}.

RESPOND IN THIS EXACT JSON FORMAT:
{{
  \"patterns\": [
    {{
      \"pattern_type\": \"time_based\",
      \"confidence\": 0.85,
      \"predicted_action\": \"User will ask about movies\",
      \"predicted_query\": \"what movies should i watch\",
      \"trigger_time\": \"2026-01-16T20:00:00Z\",
      \"reasoning\": \"User asks about movies every Friday evening\"
    }}
  ]
}}",
        min = request.min_confidence,
    ))
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String, AmbiaError> {
    serde_json::to_string_pretty(value).map_err(|e| AmbiaError::Reasoner {
        message: format!("failed to serialize prompt context: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Accepts `{"patterns": [...]}` or a bare array.
fn parse_patterns(content: &str, min_confidence: f64) -> Result<Vec<DetectedPattern>, AmbiaError> {
    let value: Value = serde_json::from_str(content.trim()).map_err(|e| AmbiaError::Reasoner {
        message: format!("pattern model reply is not valid JSON: {e}"),
        source: Some(Box::new(e)),
    })?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("patterns") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut patterns = Vec::with_capacity(items.len());
    for mut item in items {
        normalize_trigger_time(&mut item);
        match serde_json::from_value::<DetectedPattern>(item) {
            Ok(p) if p.confidence >= min_confidence => patterns.push(p),
            Ok(p) => debug!(confidence = p.confidence, "dropping low-confidence pattern"),
            Err(e) => warn!(error = %e, "dropping malformed pattern"),
        }
    }
    Ok(patterns)
}

/// Timestamps without an offset are read as UTC; unparseable ones are dropped.
fn normalize_trigger_time(item: &mut Value) {
    let Some(obj) = item.as_object_mut() else {
        return;
    };
    let Some(raw) = obj.get("trigger_time").and_then(Value::as_str) else {
        return;
    };
    if chrono::DateTime::parse_from_rfc3339(raw).is_ok() {
        return;
    }
    let fixed = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Value::String(naive.and_utc().to_rfc3339()));
    match fixed {
        Some(v) => {
            obj.insert("trigger_time".into(), v);
        }
        None => {
            obj.remove("trigger_time");
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiPatternModel {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PatternModel
    }

    async fn health_check(&self) -> Result<HealthStatus, AmbiaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AmbiaError> {
        debug!("pattern model shutting down");
        Ok(())
    }
}

#[async_trait]
impl PatternModel for OpenAiPatternModel {
    async fn detect(&self, request: &PatternRequest) -> Result<Vec<DetectedPattern>, AmbiaError> {
        let response = self.client.complete(&self.to_chat_request(request)?).await?;
        let content = response.content().ok_or_else(|| AmbiaError::Reasoner {
            message: "pattern model returned no choices".into(),
            source: None,
        })?;
        let patterns = parse_patterns(content, request.min_confidence)?;
        info!(user_id = %request.user_id, patterns = patterns.len(), "patterns detected");
        Ok(patterns)
    }
}
