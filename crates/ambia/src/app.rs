// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process wiring shared by every subcommand.

use std::sync::Arc;

use ambia_anthropic::AnthropicGenerator;
use ambia_config::AmbiaConfig;
use ambia_core::types::{AdapterType, HealthStatus};
use ambia_core::{
    AmbiaError, Clock, ContentGenerator, DetectedPattern, GeneratedDocument, GenerationRequest,
    PatternModel, PatternRequest, PluginAdapter, StorageAdapter, SystemClock,
};
use ambia_openai::OpenAiPatternModel;
use ambia_pipeline::{CacheSettings, Orchestrator, ResultCache};
use ambia_storage::SqliteStorage;
use async_trait::async_trait;
use tracing::info;

/// Whether a command talks to the model endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Models {
    Required,
    NotNeeded,
}

pub struct App {
    pub config: AmbiaConfig,
    pub storage: Arc<SqliteStorage>,
    pub clock: Arc<dyn Clock>,
    pub worker_id: String,
}

impl App {
    pub async fn open(config: AmbiaConfig) -> Result<Self, AmbiaError> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        config: AmbiaConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AmbiaError> {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let worker_id = config
            .service
            .worker_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", config.service.name, uuid::Uuid::new_v4().simple()));
        info!(
            database = %config.storage.database_path,
            worker_id = %worker_id,
            "storage ready"
        );
        Ok(Self {
            config,
            storage: Arc::new(storage),
            clock,
            worker_id,
        })
    }

    pub fn cache(&self) -> ResultCache {
        ResultCache::new(
            self.storage.clone(),
            self.clock.clone(),
            CacheSettings::from_config(&self.config.cache),
        )
    }

    pub fn content_generator(&self) -> Result<Arc<dyn ContentGenerator>, AmbiaError> {
        Ok(Arc::new(AnthropicGenerator::new(&self.config.anthropic)?))
    }

    pub fn pattern_model(&self) -> Result<Arc<dyn PatternModel>, AmbiaError> {
        Ok(Arc::new(OpenAiPatternModel::new(&self.config.pattern_model)?))
    }

    /// Builds the orchestrator. With [`Models::NotNeeded`] the model
    /// adapters are placeholders that fail every call, so maintenance and
    /// reporting work without API keys.
    pub fn orchestrator(&self, models: Models) -> Result<Orchestrator, AmbiaError> {
        let (pattern_model, content): (Arc<dyn PatternModel>, Arc<dyn ContentGenerator>) =
            match models {
                Models::Required => (self.pattern_model()?, self.content_generator()?),
                Models::NotNeeded => (Arc::new(Unconfigured), Arc::new(Unconfigured)),
            };
        Ok(Orchestrator::from_config(
            &self.config,
            self.storage.clone(),
            pattern_model,
            content,
            self.clock.clone(),
            self.worker_id.clone(),
        ))
    }

    pub async fn close(&self) -> Result<(), AmbiaError> {
        self.storage.close().await
    }
}

/// Stand-in for model adapters a command does not use.
struct Unconfigured;

impl Unconfigured {
    fn error() -> AmbiaError {
        AmbiaError::Config("model adapters are not configured for this command".into())
    }
}

#[async_trait]
impl PluginAdapter for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 0, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generator
    }

    async fn health_check(&self) -> Result<HealthStatus, AmbiaError> {
        Ok(HealthStatus::Unhealthy("not configured".into()))
    }

    async fn shutdown(&self) -> Result<(), AmbiaError> {
        Ok(())
    }
}

#[async_trait]
impl ContentGenerator for Unconfigured {
    async fn generate(&self, _: &GenerationRequest) -> Result<GeneratedDocument, AmbiaError> {
        Err(Self::error())
    }
}

#[async_trait]
impl PatternModel for Unconfigured {
    async fn detect(&self, _: &PatternRequest) -> Result<Vec<DetectedPattern>, AmbiaError> {
        Err(Self::error())
    }
}
