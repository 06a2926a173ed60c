// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Recall memory engine.

use thiserror::Error;

/// The primary error type used across all Recall adapter traits and core operations.
#[derive(Debug, Error)]
pub enum RecallError {
    /// Configuration errors: missing collaborators, invalid index names or
    /// dimensions, empty update requests.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Vector index failures, carrying the index they occurred on.
    #[error("vector index `{index_name}`: {message}")]
    Vector { index_name: String, message: String },

    /// An embedding of the wrong width was written to an index.
    #[error(
        "Vector dimension mismatch: Index \"{index_name}\" expects {expected} dimensions but got {actual} dimensions. Either use a matching embedding model or delete and recreate the index with the new dimension."
    )]
    DimensionMismatch {
        index_name: String,
        expected: usize,
        actual: usize,
    },

    /// Filter validation failures, all violations joined into one message.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Embedding provider errors (model load, HTTP failure, malformed response).
    #[error("embedding error: {message}")]
    Embedding {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The referenced thread does not exist.
    #[error("No thread found with id {thread_id}")]
    ThreadNotFound { thread_id: String },

    /// A thread was queried on behalf of a resource that does not own it.
    #[error(
        "Thread with id {thread_id} is for resource with id {expected} but resource {actual} was queried."
    )]
    OwnershipMismatch {
        thread_id: String,
        expected: String,
        actual: String,
    },

    /// JSON encoding or decoding of stored content failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RecallError {
    /// Wraps any backend error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Builds a vector index error with context.
    pub fn vector(index_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Vector {
            index_name: index_name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_message_names_index_and_sizes() {
        let err = RecallError::DimensionMismatch {
            index_name: "memory_messages_384".into(),
            expected: 384,
            actual: 1536,
        };
        let msg = err.to_string();
        assert!(msg.contains("\"memory_messages_384\""));
        assert!(msg.contains("expects 384 dimensions but got 1536"));
    }

    #[test]
    fn ownership_message_names_both_resources() {
        let err = RecallError::OwnershipMismatch {
            thread_id: "t1".into(),
            expected: "r1".into(),
            actual: "r2".into(),
        };
        assert_eq!(
            err.to_string(),
            "Thread with id t1 is for resource with id r1 but resource r2 was queried."
        );
    }
}
