// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Recall engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Thread metadata key holding the current working-memory text.
pub const WORKING_MEMORY_KEY: &str = "workingMemory";

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Embedding,
    Vector,
}

// --- Threads and messages ---

/// A conversation session scoped to one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub resource_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Thread {
    /// Returns the stored working-memory text, if any.
    pub fn working_memory(&self) -> Option<&str> {
        self.metadata
            .get(WORKING_MEMORY_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// The author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Storage-level classification of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MessageType {
    Text,
    ToolCall,
    ToolResult,
}

/// One typed part of a structured message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        result: Value,
    },
}

impl ContentPart {
    /// The tool name for tool-call and tool-result parts.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ContentPart::Text { .. } => None,
            ContentPart::ToolCall { tool_name, .. } | ContentPart::ToolResult { tool_name, .. } => {
                Some(tool_name)
            }
        }
    }
}

/// A message body: either plain text or an ordered sequence of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Plain text, or the text parts joined with `separator`. Tool parts are skipped.
    pub fn flatten_text(&self, separator: &str) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(separator),
        }
    }

    /// Whether any part is a tool call with the given id.
    pub fn has_tool_call(&self, id: &str) -> bool {
        self.parts().iter().any(
            |part| matches!(part, ContentPart::ToolCall { tool_call_id, .. } if tool_call_id == id),
        )
    }

    /// Whether any part is a tool result for the given call id.
    pub fn has_tool_result(&self, id: &str) -> bool {
        self.parts().iter().any(
            |part| matches!(part, ContentPart::ToolResult { tool_call_id, .. } if tool_call_id == id),
        )
    }

    /// The structured parts, or an empty slice for plain text.
    pub fn parts(&self) -> &[ContentPart] {
        match self {
            MessageContent::Text(_) => &[],
            MessageContent::Parts(parts) => parts,
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub resource_id: String,
    pub role: Role,
    pub content: MessageContent,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_args: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_ids: Option<Vec<String>>,
}

/// Which messages a storage fetch should return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectBy {
    /// Most recent N messages. `None` disables the recency slice.
    #[serde(default)]
    pub last: Option<usize>,
    /// Windows around specific messages.
    #[serde(default)]
    pub include: Vec<IncludeWindow>,
    /// Text to run semantic recall with.
    #[serde(default)]
    pub vector_search_string: Option<String>,
}

/// A message id plus how many neighbours on each side to fetch with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeWindow {
    pub id: String,
    #[serde(default)]
    pub with_previous_messages: usize,
    #[serde(default)]
    pub with_next_messages: usize,
}

// --- Embeddings ---

/// Input to an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    /// Texts to embed, one vector per text.
    pub texts: Vec<String>,
    /// Retry budget handed through to the provider unmodified.
    pub max_retries: u32,
}

/// Output from an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// One vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    /// Width of each vector.
    pub dimensions: usize,
}

// --- Vector indexes ---

/// Similarity metric an index was created for.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    Dotproduct,
}

/// Parameters for creating a vector index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndexParams {
    pub index_name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
}

impl CreateIndexParams {
    pub fn new(index_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            index_name: index_name.into(),
            dimension,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Parameters for writing vectors into an index.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertParams {
    pub index_name: String,
    pub vectors: Vec<Vec<f32>>,
    /// Metadata per vector. Missing entries are stored as `{}`.
    pub metadata: Vec<Value>,
    /// Ids per vector. Generated when absent.
    pub ids: Option<Vec<String>>,
}

/// Default number of hits returned by a similarity query.
pub const DEFAULT_TOP_K: usize = 10;

/// Parameters for a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub index_name: String,
    pub query_vector: Vec<f32>,
    pub top_k: usize,
    /// Mongo-style metadata filter.
    pub filter: Option<Value>,
    pub include_vector: bool,
    /// Hits scoring at or below this are dropped.
    pub min_score: f32,
}

impl QueryParams {
    pub fn new(index_name: impl Into<String>, query_vector: Vec<f32>) -> Self {
        Self {
            index_name: index_name.into(),
            query_vector,
            top_k: DEFAULT_TOP_K,
            filter: None,
            include_vector: false,
            min_score: 0.0,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A single similarity hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub score: f32,
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Shape and size of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub dimension: usize,
    pub count: usize,
    pub metric: DistanceMetric,
}

/// A partial update to one stored vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorUpdate {
    pub vector: Option<Vec<f32>>,
    pub metadata: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_parts_use_wire_field_names() {
        let content = MessageContent::Parts(vec![ContentPart::ToolCall {
            tool_call_id: "call-1".into(),
            tool_name: "search".into(),
            args: json!({"q": "rust"}),
        }]);
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(
            value,
            json!([{"type": "tool-call", "toolCallId": "call-1", "toolName": "search", "args": {"q": "rust"}}])
        );
    }

    #[test]
    fn string_content_deserializes_as_text() {
        let content: MessageContent = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(content, MessageContent::Text("hello".into()));
    }

    #[test]
    fn flatten_text_skips_tool_parts() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "a".into() },
            ContentPart::ToolResult {
                tool_call_id: "c".into(),
                tool_name: "t".into(),
                result: json!(1),
            },
            ContentPart::Text { text: "b".into() },
        ]);
        assert_eq!(content.flatten_text(" "), "a b");
        assert!(content.has_tool_result("c"));
        assert!(!content.has_tool_call("c"));
    }

    #[test]
    fn empty_working_memory_reads_as_none() {
        let mut thread = Thread {
            id: "t".into(),
            resource_id: "r".into(),
            title: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            metadata: Map::new(),
        };
        assert_eq!(thread.working_memory(), None);
        thread
            .metadata
            .insert(WORKING_MEMORY_KEY.into(), Value::String(String::new()));
        assert_eq!(thread.working_memory(), None);
        thread
            .metadata
            .insert(WORKING_MEMORY_KEY.into(), Value::String("# Notes".into()));
        assert_eq!(thread.working_memory(), Some("# Notes"));
    }

    #[test]
    fn metric_parses_lowercase() {
        use std::str::FromStr;
        assert_eq!(
            DistanceMetric::from_str("euclidean").unwrap(),
            DistanceMetric::Euclidean
        );
        assert_eq!(DistanceMetric::Cosine.to_string(), "cosine");
    }
}
