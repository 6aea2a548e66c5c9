// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-directory storage plus a manual clock, for tests that drive the
//! pipeline end to end.

use std::sync::Arc;

use ambia_config::model::{AmbiaConfig, StorageConfig};
use ambia_core::types::ActivityRecord;
use ambia_core::{AmbiaError, ManualClock, StorageAdapter};
use ambia_storage::SqliteStorage;
use chrono::{DateTime, TimeZone, Utc};

/// Monday 2026-03-02 08:00 UTC, the default start of every harness clock.
pub fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub struct TestHarness {
    pub storage: Arc<SqliteStorage>,
    pub clock: Arc<ManualClock>,
    pub config: AmbiaConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub async fn new() -> Result<Self, AmbiaError> {
        Self::with_config(AmbiaConfig::default()).await
    }

    /// Builds a harness around `config`; the storage path is replaced with a temp file.
    pub async fn with_config(mut config: AmbiaConfig) -> Result<Self, AmbiaError> {
        let temp_dir = tempfile::TempDir::new().map_err(AmbiaError::storage)?;
        let db_path = temp_dir.path().join("ambia-test.db");
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;

        Ok(Self {
            storage: Arc::new(storage),
            clock: Arc::new(ManualClock::new(default_start())),
            config,
            _temp_dir: temp_dir,
        })
    }

    /// Path of the backing database, for opening a second handle.
    pub fn database_path(&self) -> &str {
        &self.config.storage.database_path
    }

    /// Records a `query` action for `user_id` at `at`.
    pub async fn record_query(
        &self,
        user_id: &str,
        query: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AmbiaError> {
        self.storage
            .record_activity(&ActivityRecord::at(
                user_id,
                "query",
                Some(query.to_string()),
                at,
            ))
            .await
    }
}
