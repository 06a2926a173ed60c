// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage decorator that records which adapter methods were called.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use recall_core::types::{Message, SelectBy, Thread};
use recall_core::{AdapterType, HealthStatus, PluginAdapter, RecallError, StorageAdapter};

/// Wraps a storage adapter and logs every call by method name.
///
/// Used to assert that an operation issued no storage reads or writes past
/// a given point (e.g. an ownership check).
pub struct RecordingStorage {
    inner: Arc<dyn StorageAdapter>,
    calls: Mutex<Vec<String>>,
}

impl RecordingStorage {
    pub fn new(inner: Arc<dyn StorageAdapter>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Method names called so far, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// Forget everything recorded so far.
    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }

    async fn record(&self, method: &str) {
        self.calls.lock().await.push(method.to_string());
    }
}

#[async_trait]
impl PluginAdapter for RecordingStorage {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), RecallError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl StorageAdapter for RecordingStorage {
    async fn init(&self) -> Result<(), RecallError> {
        self.record("init").await;
        self.inner.init().await
    }

    async fn get_thread_by_id(&self, thread_id: &str) -> Result<Option<Thread>, RecallError> {
        self.record("get_thread_by_id").await;
        self.inner.get_thread_by_id(thread_id).await
    }

    async fn get_threads_by_resource_id(
        &self,
        resource_id: &str,
    ) -> Result<Vec<Thread>, RecallError> {
        self.record("get_threads_by_resource_id").await;
        self.inner.get_threads_by_resource_id(resource_id).await
    }

    async fn save_thread(&self, thread: Thread) -> Result<Thread, RecallError> {
        self.record("save_thread").await;
        self.inner.save_thread(thread).await
    }

    async fn update_thread(
        &self,
        thread_id: &str,
        title: Option<String>,
        metadata: Map<String, Value>,
    ) -> Result<Thread, RecallError> {
        self.record("update_thread").await;
        self.inner.update_thread(thread_id, title, metadata).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), RecallError> {
        self.record("delete_thread").await;
        self.inner.delete_thread(thread_id).await
    }

    async fn get_messages(
        &self,
        thread_id: &str,
        select_by: &SelectBy,
    ) -> Result<Vec<Message>, RecallError> {
        self.record("get_messages").await;
        self.inner.get_messages(thread_id, select_by).await
    }

    async fn save_messages(&self, messages: Vec<Message>) -> Result<Vec<Message>, RecallError> {
        self.record("save_messages").await;
        self.inner.save_messages(messages).await
    }
}
