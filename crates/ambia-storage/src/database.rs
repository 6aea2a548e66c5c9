// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection management: PRAGMA setup, migrations and lifecycle.
//!
//! A `Database` wraps one `tokio-rusqlite` connection whose closures run on a
//! single background thread. Several `Database` handles (or processes) may
//! share one file; queue and cache transitions are single statements so they
//! remain atomic across handles.

use std::path::Path;

use ambia_core::AmbiaError;
use tracing::debug;

use crate::migrations;

/// Milliseconds SQLite waits on a locked database before returning BUSY.
const BUSY_TIMEOUT_MS: u32 = 5000;

pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` in WAL mode and migrates it.
    pub async fn open(path: &str) -> Result<Self, AmbiaError> {
        Self::open_with(path, true).await
    }

    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, AmbiaError> {
        let bootstrap_path = path.to_string();
        tokio::task::spawn_blocking(move || bootstrap(&bootstrap_path, wal_mode))
            .await
            .map_err(|e| AmbiaError::Internal(format!("database bootstrap task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(AmbiaError::storage)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS.into()))?;
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying connection. All statements go through `call`.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL and closes the connection.
    pub async fn close(self) -> Result<(), AmbiaError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(AmbiaError::storage)
    }
}

/// Creates the parent directory, sets the journal mode and runs migrations
/// on a short-lived blocking connection.
fn bootstrap(path: &str, wal_mode: bool) -> Result<(), AmbiaError> {
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(AmbiaError::storage)?;
    }

    let mut conn = rusqlite::Connection::open(path).map_err(AmbiaError::storage)?;
    conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS.into()))
        .map_err(AmbiaError::storage)?;
    let mode = if wal_mode { "WAL" } else { "DELETE" };
    conn.pragma_update(None, "journal_mode", mode)
        .map_err(AmbiaError::storage)?;
    migrations::run_migrations(&mut conn)
}

/// Maps a `tokio_rusqlite` error into a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> AmbiaError {
    AmbiaError::storage(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema_in_wal_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("ambia.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let (mode, tables): (String, i64) = db
            .connection()
            .call(|conn| -> Result<(String, i64), rusqlite::Error> {
                let mode = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
                let tables = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                     ('generation_queue', 'page_cache', 'activity_log',
                      'user_behavior_patterns', 'reasoning_decisions', 'context_snapshots')",
                    [],
                    |row| row.get(0),
                )?;
                Ok((mode, tables))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert_eq!(tables, 6);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ambia.db");
        let path = path.to_str().unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();
        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();
    }
}
