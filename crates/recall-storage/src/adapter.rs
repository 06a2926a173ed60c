// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use recall_config::model::StorageConfig;
use recall_core::types::{Message, SelectBy, Thread};
use recall_core::{AdapterType, HealthStatus, PluginAdapter, RecallError, StorageAdapter};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened by [`StorageAdapter::init`];
/// calling it again is a no-op.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until `init` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, RecallError> {
        self.db.get().ok_or_else(|| RecallError::Storage {
            source: "storage not initialized -- call init() first".into(),
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

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Degraded("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecallError> {
        if let Some(db) = self.db.get()
            && self.config.wal_mode
        {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn init(&self) -> Result<(), RecallError> {
        self.db
            .get_or_try_init(|| Database::open_with(&self.config.database_path, self.config.wal_mode))
            .await?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn get_thread_by_id(&self, thread_id: &str) -> Result<Option<Thread>, RecallError> {
        queries::threads::get_thread(self.db()?, thread_id).await
    }

    async fn get_threads_by_resource_id(
        &self,
        resource_id: &str,
    ) -> Result<Vec<Thread>, RecallError> {
        queries::threads::list_threads_for_resource(self.db()?, resource_id).await
    }

    async fn save_thread(&self, thread: Thread) -> Result<Thread, RecallError> {
        queries::threads::save_thread(self.db()?, &thread).await?;
        Ok(thread)
    }

    async fn update_thread(
        &self,
        thread_id: &str,
        title: Option<String>,
        metadata: Map<String, Value>,
    ) -> Result<Thread, RecallError> {
        queries::threads::update_thread(self.db()?, thread_id, title, &metadata)
            .await?
            .ok_or_else(|| RecallError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            })
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), RecallError> {
        queries::threads::delete_thread(self.db()?, thread_id).await
    }

    async fn get_messages(
        &self,
        thread_id: &str,
        select_by: &SelectBy,
    ) -> Result<Vec<Message>, RecallError> {
        queries::messages::get_messages(self.db()?, thread_id, select_by).await
    }

    async fn save_messages(&self, messages: Vec<Message>) -> Result<Vec<Message>, RecallError> {
        if messages.is_empty() {
            return Ok(messages);
        }
        queries::messages::save_messages(self.db()?, &messages).await?;
        debug!(count = messages.len(), "messages saved");
        Ok(messages)
    }
}
