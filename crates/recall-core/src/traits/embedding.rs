// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::RecallError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Default upper bound on texts per provider request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 256;

/// Adapter for turning text into vectors.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Generates one embedding per input text, in order.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RecallError>;

    /// Largest number of texts the provider accepts per request.
    fn max_batch_size(&self) -> usize {
        DEFAULT_MAX_BATCH_SIZE
    }

    /// True for the in-process default model, whose first call pays a cold
    /// start that concurrent callers should share.
    fn is_local_default(&self) -> bool {
        false
    }
}
