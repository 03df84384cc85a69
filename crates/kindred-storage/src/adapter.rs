// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the memory persistence traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use kindred_config::model::StorageConfig;
use kindred_core::{
    AdapterType, ArchivalMemory, BlockKind, BlockStore, HealthStatus, KindredError, MemoryBlock,
    MemoryRow, MemoryRowStore, PluginAdapter,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed row and block store.
///
/// The database is opened lazily by [`SqliteStorage::initialize`]; every
/// other call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a store for the configured database path without opening it.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::from(db),
        }
    }

    /// Open the database and apply migrations.
    pub async fn initialize(&self) -> Result<(), KindredError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| KindredError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Checkpoint the WAL. The connection stays usable.
    pub async fn close(&self) -> Result<(), KindredError> {
        self.database()?.checkpoint().await
    }

    /// The opened database, or an error if [`initialize`](Self::initialize) was not called.
    pub fn database(&self) -> Result<&Database, KindredError> {
        self.db.get().ok_or_else(|| KindredError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, KindredError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), KindredError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryRowStore for SqliteStorage {
    async fn get_row(
        &self,
        bot_id: &str,
        user_id: &str,
    ) -> Result<Option<MemoryRow>, KindredError> {
        queries::bot_memory::get_row(self.database()?, bot_id, user_id).await
    }

    async fn upsert_row(&self, row: &MemoryRow) -> Result<(), KindredError> {
        queries::bot_memory::upsert_row(self.database()?, row).await
    }
}

#[async_trait]
impl BlockStore for SqliteStorage {
    async fn list_blocks(&self, kind: BlockKind) -> Result<Vec<MemoryBlock>, KindredError> {
        queries::blocks::list_blocks(self.database()?, kind).await
    }

    async fn list_archival(&self) -> Result<Vec<ArchivalMemory>, KindredError> {
        queries::archival::list_archival(self.database()?).await
    }
}
