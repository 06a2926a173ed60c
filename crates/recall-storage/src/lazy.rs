// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ensure-initialized decorator for storage adapters.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use recall_core::types::{Message, SelectBy, Thread};
use recall_core::{AdapterType, HealthStatus, PluginAdapter, RecallError, StorageAdapter};

/// Wraps a storage adapter so its `init()` runs exactly once, lazily, before
/// the first real call.
///
/// Concurrent first callers share one in-flight initialization. If it fails,
/// the error is returned to those callers and the next call tries again.
/// After success every call passes straight through.
pub struct LazyInit<S: ?Sized> {
    ready: OnceCell<()>,
    inner: Arc<S>,
}

impl<S: StorageAdapter> LazyInit<S> {
    pub fn new(inner: S) -> Self {
        Self::shared(Arc::new(inner))
    }
}

impl<S: StorageAdapter + ?Sized> LazyInit<S> {
    /// Wraps an adapter that is already shared, e.g. an `Arc<dyn StorageAdapter>`.
    pub fn shared(inner: Arc<S>) -> Self {
        Self {
            ready: OnceCell::new(),
            inner,
        }
    }

    /// The wrapped adapter, without waiting for initialization.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn ready(&self) -> Result<&S, RecallError> {
        self.ready.get_or_try_init(|| self.inner.init()).await?;
        Ok(&self.inner)
    }
}

#[async_trait]
impl<S: StorageAdapter + ?Sized> PluginAdapter for LazyInit<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        self.inner.adapter_type()
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        self.ready().await?.health_check().await
    }

    async fn shutdown(&self) -> Result<(), RecallError> {
        if self.ready.initialized() {
            self.inner.shutdown().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S: StorageAdapter + ?Sized> StorageAdapter for LazyInit<S> {
    async fn init(&self) -> Result<(), RecallError> {
        self.ready().await.map(|_| ())
    }

    async fn get_thread_by_id(&self, thread_id: &str) -> Result<Option<Thread>, RecallError> {
        self.ready().await?.get_thread_by_id(thread_id).await
    }

    async fn get_threads_by_resource_id(
        &self,
        resource_id: &str,
    ) -> Result<Vec<Thread>, RecallError> {
        self.ready().await?.get_threads_by_resource_id(resource_id).await
    }

    async fn save_thread(&self, thread: Thread) -> Result<Thread, RecallError> {
        self.ready().await?.save_thread(thread).await
    }

    async fn update_thread(
        &self,
        thread_id: &str,
        title: Option<String>,
        metadata: Map<String, Value>,
    ) -> Result<Thread, RecallError> {
        self.ready()
            .await?
            .update_thread(thread_id, title, metadata)
            .await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), RecallError> {
        self.ready().await?.delete_thread(thread_id).await
    }

    async fn get_messages(
        &self,
        thread_id: &str,
        select_by: &SelectBy,
    ) -> Result<Vec<Message>, RecallError> {
        self.ready().await?.get_messages(thread_id, select_by).await
    }

    async fn save_messages(&self, messages: Vec<Message>) -> Result<Vec<Message>, RecallError> {
        self.ready().await?.save_messages(messages).await
    }
}
