// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Recall memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Recall configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecallConfig {
    /// Thread/message store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Vector index store settings.
    #[serde(default)]
    pub vector: VectorConfig,

    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Instance-level memory options, layered over the built-in defaults.
    #[serde(default)]
    pub memory: MemoryOptions,
}

/// SQLite thread/message storage configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    data_file("recall.db")
}

fn default_wal_mode() -> bool {
    true
}

/// Vector index store configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VectorConfig {
    /// Attach a vector store at all. Semantic recall needs one.
    #[serde(default = "default_vector_enabled")]
    pub enabled: bool,

    /// Path to the SQLite file holding vector indexes.
    #[serde(default = "default_vector_path")]
    pub database_path: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            enabled: default_vector_enabled(),
            database_path: default_vector_path(),
        }
    }
}

fn default_vector_enabled() -> bool {
    true
}

fn default_vector_path() -> String {
    data_file("vectors.db")
}

fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("recall").join(name))
        .unwrap_or_else(|| std::path::PathBuf::from(name))
        .to_string_lossy()
        .into_owned()
}

/// Which embedding backend to use.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmbeddingProvider {
    /// In-process ONNX model.
    #[default]
    Local,
    /// OpenAI-compatible `/embeddings` HTTP endpoint.
    OpenAi,
    /// No embedder; semantic recall unavailable.
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    Disabled,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Model name. Defaults per provider when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// Base URL of the HTTP provider.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Retry budget passed through to the provider.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum texts per provider request.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Directory for downloaded local model files.
    #[serde(default)]
    pub model_dir: Option<String>,
}

impl EmbeddingConfig {
    /// Configured model, or the provider's default.
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, EmbeddingProvider::OpenAi) => "text-embedding-3-small",
            (None, _) => "all-MiniLM-L6-v2",
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: None,
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            max_batch_size: default_max_batch_size(),
            model_dir: None,
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_batch_size() -> usize {
    256
}

// --- Memory options ---

/// Partial memory configuration.
///
/// Every field is optional so a layer only overrides what it sets. Layers
/// are folded into a [`ThreadConfig`](crate::thread::ThreadConfig).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryOptions {
    /// Most recent messages to recall, or `false` to disable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_messages: Option<LastMessages>,

    /// `true`, `false`, or a `{ top_k, message_range }` table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_recall: Option<SemanticRecallSetting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_memory: Option<WorkingMemoryOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<ThreadsOptions>,
}

/// A message count or an on/off switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LastMessages {
    Count(usize),
    Flag(bool),
}

/// Semantic recall as a switch or as explicit options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SemanticRecallSetting {
    Flag(bool),
    Options(SemanticRecallOptions),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticRecallOptions {
    /// Hits per query embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,

    /// Neighbours fetched around each hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_range: Option<MessageRange>,
}

/// Context window around a semantic hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageRange {
    Symmetric(usize),
    Window { before: usize, after: usize },
}

impl MessageRange {
    /// `(before, after)` counts.
    pub fn bounds(self) -> (usize, usize) {
        match self {
            MessageRange::Symmetric(n) => (n, n),
            MessageRange::Window { before, after } => (before, after),
        }
    }
}

/// How the model is told to update working memory.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WorkingMemoryMode {
    /// Inline `<working_memory>` blocks in the reply text.
    TextStream,
    /// Calls to the `updateWorkingMemory` tool.
    #[default]
    ToolCall,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkingMemoryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Markdown skeleton seeded into new threads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<WorkingMemoryMode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_title: Option<bool>,
}
