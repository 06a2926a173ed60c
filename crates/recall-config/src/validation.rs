// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::{EmbeddingProvider, RecallConfig, SemanticRecallSetting};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns every violation found rather than stopping at the first.
pub fn validate_config(config: &RecallConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.vector.enabled && config.vector.database_path.trim().is_empty() {
        fail("vector.database_path must not be empty when vector.enabled is true".to_string());
    }

    if config.embedding.max_batch_size == 0 {
        fail("embedding.max_batch_size must be at least 1".to_string());
    }

    if config.embedding.provider == EmbeddingProvider::OpenAi {
        let base = config.embedding.api_base.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            fail(format!(
                "embedding.api_base `{base}` must be an http(s) URL"
            ));
        }
        if config.embedding.api_key_env.trim().is_empty() {
            fail("embedding.api_key_env must not be empty for the openai provider".to_string());
        }
    }

    if let Some(SemanticRecallSetting::Options(opts)) = config.memory.semantic_recall
        && opts.top_k == Some(0)
    {
        fail("memory.semantic_recall.top_k must be at least 1".to_string());
    }

    let recall_on = matches!(
        config.memory.semantic_recall,
        Some(SemanticRecallSetting::Flag(true)) | Some(SemanticRecallSetting::Options(_))
    );
    if recall_on && config.embedding.provider == EmbeddingProvider::Disabled {
        fail("memory.semantic_recall requires an embedding provider".to_string());
    }
    if recall_on && !config.vector.enabled {
        fail("memory.semantic_recall requires vector.enabled = true".to_string());
    }

    if let Some(template) = config
        .memory
        .working_memory
        .as_ref()
        .and_then(|wm| wm.template.as_deref())
        && template.trim().is_empty()
    {
        fail("memory.working_memory.template must not be blank".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
