// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for thread and message persistence.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::RecallError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Message, SelectBy, Thread};

/// Adapter for the thread/message store.
///
/// `init` is idempotent schema setup. Every other method assumes it has
/// completed; wrap an adapter in a lazy initializer when callers cannot
/// guarantee that ordering themselves.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Prepares the backend (schema, pragmas). Safe to call repeatedly.
    async fn init(&self) -> Result<(), RecallError>;

    async fn get_thread_by_id(&self, thread_id: &str) -> Result<Option<Thread>, RecallError>;

    /// Threads owned by a resource, newest first.
    async fn get_threads_by_resource_id(
        &self,
        resource_id: &str,
    ) -> Result<Vec<Thread>, RecallError>;

    /// Inserts or replaces a thread.
    async fn save_thread(&self, thread: Thread) -> Result<Thread, RecallError>;

    /// Replaces the metadata (and title, when given) of an existing thread.
    ///
    /// Fails with [`RecallError::ThreadNotFound`] when the thread is unknown.
    async fn update_thread(
        &self,
        thread_id: &str,
        title: Option<String>,
        metadata: Map<String, Value>,
    ) -> Result<Thread, RecallError>;

    /// Deletes a thread and all of its messages.
    async fn delete_thread(&self, thread_id: &str) -> Result<(), RecallError>;

    /// Returns the union of the last-N slice and every include window,
    /// deduplicated by id and ordered oldest first.
    async fn get_messages(
        &self,
        thread_id: &str,
        select_by: &SelectBy,
    ) -> Result<Vec<Message>, RecallError>;

    /// Persists messages, replacing any with the same id.
    async fn save_messages(&self, messages: Vec<Message>) -> Result<Vec<Message>, RecallError>;
}
