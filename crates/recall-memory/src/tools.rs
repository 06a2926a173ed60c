// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools the memory engine exposes to a model.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use recall_core::types::WORKING_MEMORY_KEY;
use recall_core::{RecallError, StorageAdapter};

use crate::working_memory::UPDATE_WORKING_MEMORY_TOOL;

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// The content returned by the tool, usually JSON text.
    pub content: String,
    pub is_error: bool,
}

/// The conversation a tool call was made in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub thread_id: String,
    pub resource_id: Option<String>,
}

/// A tool callable by a model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's unique name (used for lookup and API serialization).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Returns the JSON Schema describing the tool's input parameters.
    fn parameters_schema(&self) -> Value;

    /// Invokes the tool with the given JSON input.
    async fn invoke(&self, input: Value, context: &ToolContext) -> Result<ToolOutput, RecallError>;
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateWorkingMemoryArgs {
    /// The Markdown-formatted working memory content to store
    memory: String,
}

/// Replaces a thread's working memory with the text the model supplies.
pub struct UpdateWorkingMemoryTool {
    storage: Arc<dyn StorageAdapter>,
}

impl UpdateWorkingMemoryTool {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Tool for UpdateWorkingMemoryTool {
    fn name(&self) -> &str {
        UPDATE_WORKING_MEMORY_TOOL
    }

    fn description(&self) -> &str {
        "Update the working memory with new information"
    }

    fn parameters_schema(&self) -> Value {
        schemars::schema_for!(UpdateWorkingMemoryArgs).to_value()
    }

    async fn invoke(&self, input: Value, context: &ToolContext) -> Result<ToolOutput, RecallError> {
        let args: UpdateWorkingMemoryArgs = serde_json::from_value(input)?;

        let mut thread = self
            .storage
            .get_thread_by_id(&context.thread_id)
            .await?
            .ok_or_else(|| RecallError::ThreadNotFound {
                thread_id: context.thread_id.clone(),
            })?;

        thread
            .metadata
            .insert(WORKING_MEMORY_KEY.to_string(), Value::String(args.memory));
        thread.updated_at = chrono::Utc::now();
        self.storage.save_thread(thread).await?;

        debug!(thread_id = %context.thread_id, "working memory updated by tool call");
        Ok(ToolOutput {
            content: serde_json::json!({ "success": true }).to_string(),
            is_error: false,
        })
    }
}
