// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Recall conversational memory engine.
//!
//! This crate provides the error type, the thread/message data model, vector
//! index parameter types, and the adapter traits that storage, embedding and
//! vector backends implement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RecallError;
pub use types::{
    AdapterType, ContentPart, HealthStatus, IncludeWindow, Message, MessageContent, MessageType,
    Role, SelectBy, Thread,
};

// Re-export all adapter traits at crate root.
pub use traits::{EmbeddingAdapter, PluginAdapter, StorageAdapter, VectorAdapter};
