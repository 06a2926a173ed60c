// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector index adapter trait.

use async_trait::async_trait;

use crate::error::RecallError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    CreateIndexParams, IndexStats, QueryParams, QueryResult, UpsertParams, VectorUpdate,
};

/// Adapter for a store of named, fixed-dimension vector collections.
#[async_trait]
pub trait VectorAdapter: PluginAdapter {
    /// Creates an index, or validates an existing one against the request.
    async fn create_index(&self, params: CreateIndexParams) -> Result<(), RecallError>;

    /// Writes all vectors atomically and returns their ids.
    async fn upsert(&self, params: UpsertParams) -> Result<Vec<String>, RecallError>;

    /// Runs a filtered similarity search, best hits first.
    async fn query(&self, params: QueryParams) -> Result<Vec<QueryResult>, RecallError>;

    async fn list_indexes(&self) -> Result<Vec<String>, RecallError>;

    async fn describe_index(&self, index_name: &str) -> Result<IndexStats, RecallError>;

    /// Drops an index. Dropping a missing index succeeds.
    async fn delete_index(&self, index_name: &str) -> Result<(), RecallError>;

    async fn update_vector(
        &self,
        index_name: &str,
        id: &str,
        update: VectorUpdate,
    ) -> Result<(), RecallError>;

    async fn delete_vector(&self, index_name: &str, id: &str) -> Result<(), RecallError>;

    /// Removes every row while keeping the index definition.
    async fn truncate_index(&self, index_name: &str) -> Result<(), RecallError>;
}
