// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end memory tests.
//!
//! `TestHarness` assembles the collaborators a memory engine needs: a
//! temp-file SQLite storage behind the lazy-init wrapper and a call
//! recorder, an in-memory vector store, and a [`MockEmbedder`].

use std::sync::Arc;
use std::time::Duration;

use recall_config::RecallConfig;
use recall_config::model::StorageConfig;
use recall_core::RecallError;
use recall_storage::{LazyInit, SqliteStorage};
use recall_vector::SqliteVector;

use crate::mock_embedder::{MOCK_DIMENSION, MockEmbedder};
use crate::recording_storage::RecordingStorage;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    dimension: usize,
    local_default: bool,
    embed_delay: Option<Duration>,
    with_vector: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            dimension: MOCK_DIMENSION,
            local_default: false,
            embed_delay: None,
            with_vector: true,
        }
    }

    /// Width of the mock embedder's vectors.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Make the mock embedder report itself as the local default model.
    pub fn with_local_default_embedder(mut self) -> Self {
        self.local_default = true;
        self
    }

    /// Make every embedding call take at least this long.
    pub fn with_embed_delay(mut self, delay: Duration) -> Self {
        self.embed_delay = Some(delay);
        self
    }

    /// Build without a vector store.
    pub fn without_vector(mut self) -> Self {
        self.with_vector = false;
        self
    }

    /// Build the test harness, creating all required collaborators.
    pub async fn build(self) -> Result<TestHarness, RecallError> {
        let temp_dir = tempfile::TempDir::new().map_err(RecallError::storage)?;
        let db_path = temp_dir.path().join("recall.db");

        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let storage = LazyInit::new(SqliteStorage::new(storage_config.clone()));
        let storage = Arc::new(RecordingStorage::new(Arc::new(storage)));

        let vector = if self.with_vector {
            Some(Arc::new(SqliteVector::open_in_memory().await?))
        } else {
            None
        };

        let mut embedder = MockEmbedder::with_dimension(self.dimension);
        if self.local_default {
            embedder = embedder.as_local_default();
        }
        if let Some(delay) = self.embed_delay {
            embedder = embedder.with_delay(delay);
        }

        let config = RecallConfig {
            storage: storage_config,
            ..RecallConfig::default()
        };

        Ok(TestHarness {
            storage,
            vector,
            embedder: Arc::new(embedder),
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete set of collaborators backed by temp storage.
pub struct TestHarness {
    /// SQLite storage (temp DB, cleaned up on drop) behind a call recorder.
    pub storage: Arc<RecordingStorage>,
    /// In-memory vector store, unless built `without_vector`.
    pub vector: Option<Arc<SqliteVector>>,
    /// Deterministic embedder.
    pub embedder: Arc<MockEmbedder>,
    /// Configuration pointing at the temp database.
    pub config: RecallConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::{EmbeddingAdapter, StorageAdapter, VectorAdapter};

    use crate::fixtures;

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        let threads = harness
            .storage
            .get_threads_by_resource_id("r1")
            .await
            .unwrap();
        assert!(threads.is_empty());
        let vector = harness.vector.as_ref().unwrap();
        assert!(vector.list_indexes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_calls_are_recorded() {
        let harness = TestHarness::builder().without_vector().build().await.unwrap();
        assert!(harness.vector.is_none());

        harness
            .storage
            .save_thread(fixtures::thread("t1", "r1"))
            .await
            .unwrap();
        harness.storage.get_thread_by_id("t1").await.unwrap();
        assert_eq!(
            harness.storage.calls().await,
            vec!["save_thread", "get_thread_by_id"]
        );
    }

    #[tokio::test]
    async fn temp_db_is_unique_per_harness() {
        let h1 = TestHarness::builder().build().await.unwrap();
        let h2 = TestHarness::builder().build().await.unwrap();

        h1.storage
            .save_thread(fixtures::thread("t1", "r1"))
            .await
            .unwrap();
        assert!(h1.storage.get_thread_by_id("t1").await.unwrap().is_some());
        assert!(h2.storage.get_thread_by_id("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn builder_configures_embedder() {
        let harness = TestHarness::builder()
            .with_dimension(16)
            .with_local_default_embedder()
            .build()
            .await
            .unwrap();
        assert!(harness.embedder.is_local_default());
        assert_eq!(harness.embedder.embed_text("x").len(), 16);
    }
}
