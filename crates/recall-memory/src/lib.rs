// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversational memory for the Recall engine.
//!
//! Recalls thread history by recency and semantic similarity, persists and
//! indexes new messages, and keeps a per-thread working-memory document the
//! model can update.
//!
//! ## Architecture
//!
//! - **Memory**: The orchestrator over storage, vector and embedding adapters
//! - **EmbeddingCache**: Chunking and memoized embedding of message text
//! - **OnnxEmbedder**: Local 384-dim model, downloaded on first use
//! - **OpenAiEmbedder**: Remote embeddings over an OpenAI-compatible API
//! - **Working memory**: Block extraction, hiding and system instructions
//! - **Presentation**: Tool-call repair and UI-shaped messages
//! - **Processors**: Token limiting and tool filtering of recalled history

pub mod cache;
pub mod chunker;
#[cfg(feature = "local-embedder")]
pub mod embedder;
pub mod memory;
#[cfg(feature = "local-embedder")]
pub mod model_manager;
pub mod openai;
pub mod presentation;
pub mod processors;
pub mod reorder;
pub mod tools;
pub mod working_memory;

pub use cache::{Embedded, EmbeddingCache};
pub use chunker::chunk_text;
#[cfg(feature = "local-embedder")]
pub use embedder::OnnxEmbedder;
pub use memory::{
    AddMessageArgs, CreateThreadArgs, Memory, MemoryBuilder, QueryArgs, RecallResult,
    RememberArgs, SaveMessagesArgs, embedding_index_name,
};
#[cfg(feature = "local-embedder")]
pub use model_manager::ModelManager;
pub use openai::OpenAiEmbedder;
pub use presentation::{ToolInvocation, UiMessage, convert_to_ui_messages, parse_messages};
pub use processors::{MessageProcessor, ProcessorContext, TokenLimiter, ToolCallFilter};
pub use reorder::reorder_tool_calls_and_results;
pub use tools::{Tool, ToolContext, ToolOutput, UpdateWorkingMemoryTool};
