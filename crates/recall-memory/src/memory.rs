// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory orchestrator.
//!
//! [`Memory`] ties a thread/message store, an optional vector index and an
//! optional embedder together. It recalls history by recency and semantic
//! similarity, persists new messages (indexing them for later recall), and
//! maintains per-thread working memory.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::future::{join_all, try_join_all};
use serde_json::{Map, Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use recall_config::model::{EmbeddingProvider, WorkingMemoryMode};
use recall_config::{MemoryOptions, RecallConfig, ThreadConfig};
use recall_core::types::{
    CreateIndexParams, IncludeWindow, Message, MessageContent, MessageType, QueryParams, Role,
    SelectBy, Thread, UpsertParams, WORKING_MEMORY_KEY,
};
use recall_core::{EmbeddingAdapter, PluginAdapter, RecallError, StorageAdapter, VectorAdapter};
use recall_storage::{LazyInit, SqliteStorage};
use recall_vector::SqliteVector;

use crate::cache::{Embedded, EmbeddingCache};
use crate::chunker::DEFAULT_CHUNK_TOKENS;
use crate::openai::OpenAiEmbedder;
use crate::presentation::{UiMessage, convert_to_ui_messages, parse_messages};
use crate::processors::{MessageProcessor, ProcessorContext, apply_processors};
use crate::reorder::reorder_tool_calls_and_results;
use crate::tools::{Tool, UpdateWorkingMemoryTool};
use crate::working_memory::{
    DEFAULT_TEMPLATE, extract_working_memory, hide_working_memory, text_stream_instruction,
    tool_call_instruction,
};

/// Embedding width that maps to the unsuffixed index name.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
/// Base name of the message embedding index.
pub const MESSAGE_INDEX_BASE: &str = "memory_messages";

/// Name of the message index for embeddings of `dimension` width.
pub fn embedding_index_name(dimension: usize) -> String {
    if dimension == DEFAULT_EMBEDDING_DIMENSION {
        MESSAGE_INDEX_BASE.to_string()
    } else {
        format!("{MESSAGE_INDEX_BASE}_{dimension}")
    }
}

/// Arguments to [`Memory::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub thread_id: String,
    /// When set, must own the thread.
    pub resource_id: Option<String>,
    pub select_by: SelectBy,
    /// Call-time overrides layered over the instance options.
    pub memory_config: Option<MemoryOptions>,
}

impl QueryArgs {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            ..Default::default()
        }
    }

    pub fn resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn select_by(mut self, select_by: SelectBy) -> Self {
        self.select_by = select_by;
        self
    }

    pub fn memory_config(mut self, options: MemoryOptions) -> Self {
        self.memory_config = Some(options);
        self
    }
}

/// Recalled history in storage and UI shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecallResult {
    pub thread_id: String,
    pub messages: Vec<Message>,
    pub ui_messages: Vec<UiMessage>,
}

/// Arguments to [`Memory::remember_messages`].
#[derive(Debug, Clone, Default)]
pub struct RememberArgs {
    pub thread_id: String,
    pub resource_id: Option<String>,
    /// Text to recall semantically similar messages for.
    pub vector_message_search: Option<String>,
    pub memory_config: Option<MemoryOptions>,
}

/// Arguments to [`Memory::save_messages`].
#[derive(Debug, Clone, Default)]
pub struct SaveMessagesArgs {
    pub messages: Vec<Message>,
    pub memory_config: Option<MemoryOptions>,
}

/// Arguments to [`Memory::create_thread`].
#[derive(Debug, Clone, Default)]
pub struct CreateThreadArgs {
    pub resource_id: String,
    /// Generated when absent.
    pub thread_id: Option<String>,
    /// Defaults to `New Thread <timestamp>`.
    pub title: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    pub memory_config: Option<MemoryOptions>,
}

/// Arguments to [`Memory::add_message`].
#[derive(Debug, Clone)]
pub struct AddMessageArgs {
    pub thread_id: String,
    pub resource_id: String,
    pub content: MessageContent,
    pub role: Role,
    pub kind: MessageType,
    pub tool_names: Option<Vec<String>>,
    pub tool_call_args: Option<Vec<Value>>,
    pub tool_call_ids: Option<Vec<String>>,
}

/// Builder for [`Memory`].
pub struct MemoryBuilder {
    storage: Arc<dyn StorageAdapter>,
    vector: Option<Arc<dyn VectorAdapter>>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    options: MemoryOptions,
    processors: Vec<Arc<dyn MessageProcessor>>,
    max_retries: u32,
    chunk_tokens: usize,
}

impl MemoryBuilder {
    pub fn vector(mut self, vector: Arc<dyn VectorAdapter>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Instance-level options, layered over the built-in defaults.
    pub fn options(mut self, options: MemoryOptions) -> Self {
        self.options = options;
        self
    }

    /// Appends a processor to the default processing chain.
    pub fn processor(mut self, processor: Arc<dyn MessageProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Retry budget handed to the embedding provider on every call.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Token budget per embedded chunk.
    pub fn chunk_tokens(mut self, chunk_tokens: usize) -> Self {
        self.chunk_tokens = chunk_tokens;
        self
    }

    pub fn build(self) -> Memory {
        let thread_config = ThreadConfig::resolve([&self.options]);
        let embeddings = self.embedder.map(|embedder| {
            EmbeddingCache::new(embedder, self.max_retries).with_chunk_tokens(self.chunk_tokens)
        });
        Memory {
            storage: Arc::new(LazyInit::shared(self.storage)),
            vector: self.vector,
            embeddings,
            thread_config,
            processors: self.processors,
        }
    }
}

/// Conversational memory over a storage, vector and embedding backend.
pub struct Memory {
    storage: Arc<dyn StorageAdapter>,
    vector: Option<Arc<dyn VectorAdapter>>,
    embeddings: Option<EmbeddingCache>,
    thread_config: ThreadConfig,
    processors: Vec<Arc<dyn MessageProcessor>>,
}

impl Memory {
    /// Starts a builder around `storage`. Its `init()` runs before the first
    /// call that reaches it.
    pub fn builder(storage: Arc<dyn StorageAdapter>) -> MemoryBuilder {
        MemoryBuilder {
            storage,
            vector: None,
            embedder: None,
            options: MemoryOptions::default(),
            processors: Vec::new(),
            max_retries: 3,
            chunk_tokens: DEFAULT_CHUNK_TOKENS,
        }
    }

    /// Assembles the backends described by `config`.
    pub async fn from_config(config: &RecallConfig) -> Result<Self, RecallError> {
        let storage: Arc<dyn StorageAdapter> = Arc::new(SqliteStorage::new(config.storage.clone()));
        let mut builder = Self::builder(storage)
            .options(config.memory.clone())
            .max_retries(config.embedding.max_retries);

        if let Some(vector) = SqliteVector::from_config(&config.vector).await? {
            builder = builder.vector(Arc::new(vector));
        }

        let embedder: Option<Arc<dyn EmbeddingAdapter>> = match config.embedding.provider {
            EmbeddingProvider::Local => Some(local_embedder(config)?),
            EmbeddingProvider::OpenAi => Some(Arc::new(OpenAiEmbedder::from_config(
                &config.embedding,
            )?)),
            EmbeddingProvider::Disabled => None,
        };
        if let Some(embedder) = embedder {
            info!(
                embedder = embedder.name(),
                model = config.embedding.model_name(),
                "embedding provider configured"
            );
            builder = builder.embedder(embedder);
        }

        Ok(builder.build())
    }

    /// The instance configuration with `call` layered on top.
    pub fn thread_config(&self, call: Option<&MemoryOptions>) -> ThreadConfig {
        match call {
            Some(options) => self.thread_config.merged(options),
            None => self.thread_config.clone(),
        }
    }

    /// The storage adapter, behind its lazy initializer.
    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    // --- Recall ---

    /// Fetches history for a thread.
    ///
    /// The result is the union of `select_by.last` and, when semantic recall
    /// is on and a search string is given, windows around the best matching
    /// messages. It is ordered by creation time with every tool result placed
    /// right after its call.
    pub async fn query(&self, args: QueryArgs) -> Result<RecallResult, RecallError> {
        let QueryArgs {
            thread_id,
            resource_id,
            mut select_by,
            memory_config,
        } = args;
        let config = self.thread_config(memory_config.as_ref());

        if let Some(resource_id) = &resource_id {
            self.validate_thread_owner(&thread_id, resource_id).await?;
        }

        if let (Some(recall), Some(search)) = (
            config.semantic_recall,
            select_by
                .vector_search_string
                .clone()
                .filter(|s| !s.is_empty()),
        ) {
            let windows = self
                .semantic_windows(&thread_id, &search, recall.top_k, recall.before, recall.after)
                .await?;
            select_by.include.extend(windows);
        }

        let mut raw = self.storage.get_messages(&thread_id, &select_by).await?;
        raw.sort_by_key(|m| m.created_at);
        let messages = parse_messages(reorder_tool_calls_and_results(raw));
        let ui_messages = convert_to_ui_messages(&messages);

        debug!(thread_id = %thread_id, count = messages.len(), "recalled messages");
        Ok(RecallResult {
            thread_id,
            messages,
            ui_messages,
        })
    }

    async fn semantic_windows(
        &self,
        thread_id: &str,
        search: &str,
        top_k: usize,
        before: usize,
        after: usize,
    ) -> Result<Vec<IncludeWindow>, RecallError> {
        let vector = self.require_vector()?;
        let embedded = self.embed(search).await?;
        if embedded.embeddings.is_empty() {
            return Ok(Vec::new());
        }
        let index_name = self.create_embedding_index(embedded.dimension).await?;

        let queries = embedded.embeddings.iter().map(|embedding| {
            vector.query(
                QueryParams::new(index_name.clone(), embedding.clone())
                    .with_top_k(top_k)
                    .with_filter(json!({ "thread_id": thread_id })),
            )
        });
        let hits: Vec<_> = try_join_all(queries).await?.into_iter().flatten().collect();
        debug!(thread_id, hits = hits.len(), "semantic recall hits");

        Ok(hits
            .iter()
            .filter_map(|hit| hit.metadata.get("message_id").and_then(Value::as_str))
            .map(|id| IncludeWindow {
                id: id.to_string(),
                with_previous_messages: before,
                with_next_messages: after,
            })
            .collect())
    }

    /// Recalls history with the configured recency and semantic settings.
    ///
    /// Returns nothing when both strategies are switched off.
    pub async fn remember_messages(&self, args: RememberArgs) -> Result<RecallResult, RecallError> {
        let config = self.thread_config(args.memory_config.as_ref());
        if config.recall_disabled() {
            return Ok(RecallResult {
                thread_id: args.thread_id,
                ..Default::default()
            });
        }

        let select_by = SelectBy {
            last: config.last_messages,
            include: Vec::new(),
            vector_search_string: args
                .vector_message_search
                .filter(|_| config.semantic_recall.is_some()),
        };
        self.query(QueryArgs {
            thread_id: args.thread_id,
            resource_id: args.resource_id,
            select_by,
            memory_config: args.memory_config,
        })
        .await
    }

    async fn validate_thread_owner(
        &self,
        thread_id: &str,
        resource_id: &str,
    ) -> Result<(), RecallError> {
        let thread = self.storage.get_thread_by_id(thread_id).await?.ok_or_else(|| {
            RecallError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            }
        })?;
        if thread.resource_id != resource_id {
            return Err(RecallError::OwnershipMismatch {
                thread_id: thread_id.to_string(),
                expected: thread.resource_id,
                actual: resource_id.to_string(),
            });
        }
        Ok(())
    }

    // --- Persistence ---

    /// Persists messages and indexes them for semantic recall.
    ///
    /// Working memory in the latest message is applied to its thread first.
    /// Working-memory blocks and update-tool traffic are then removed, so
    /// neither is ever stored as conversation. Each remaining message with
    /// text is embedded and upserted concurrently; the first failure is
    /// returned once all of them have finished.
    pub async fn save_messages(&self, args: SaveMessagesArgs) -> Result<Vec<Message>, RecallError> {
        let config = self.thread_config(args.memory_config.as_ref());
        if config.working_memory.enabled {
            self.save_working_memory(&args.messages).await?;
        }

        let messages = hide_working_memory(args.messages);
        let saved = self.storage.save_messages(messages.clone()).await?;

        if config.semantic_recall.is_some() {
            let pending: Vec<(&Message, String)> = messages
                .iter()
                .filter_map(|m| embeddable_text(m).map(|text| (m, text)))
                .collect();
            if !pending.is_empty() {
                let vector = self.require_vector()?;
                let index_name = OnceCell::new();
                let results = join_all(pending.into_iter().map(|(message, text)| {
                    self.index_message(vector, &index_name, message, text)
                }))
                .await;
                results.into_iter().collect::<Result<(), _>>()?;
            }
        }

        Ok(saved)
    }

    async fn index_message(
        &self,
        vector: &Arc<dyn VectorAdapter>,
        index_name: &OnceCell<String>,
        message: &Message,
        text: String,
    ) -> Result<(), RecallError> {
        let embedded = self.embed(&text).await?;
        if embedded.embeddings.is_empty() {
            return Ok(());
        }
        let index_name = index_name
            .get_or_try_init(|| self.create_embedding_index(embedded.dimension))
            .await?;

        let metadata = vec![
            json!({
                "message_id": message.id,
                "thread_id": message.thread_id,
                "resource_id": message.resource_id,
            });
            embedded.chunks.len()
        ];
        vector
            .upsert(UpsertParams {
                index_name: index_name.clone(),
                vectors: embedded.embeddings.clone(),
                metadata,
                ids: None,
            })
            .await?;
        debug!(message_id = %message.id, chunks = embedded.chunks.len(), "message indexed");
        Ok(())
    }

    /// Applies the working-memory block in the last message to its thread.
    ///
    /// Returns the stored text, or `None` when the message carried no block
    /// or its thread does not exist.
    pub async fn save_working_memory(
        &self,
        messages: &[Message],
    ) -> Result<Option<String>, RecallError> {
        let Some(latest) = messages.last() else {
            return Ok(None);
        };
        let Some(memory) = extract_working_memory(&latest.content.flatten_text("\n")) else {
            return Ok(None);
        };
        let Some(thread) = self.storage.get_thread_by_id(&latest.thread_id).await? else {
            return Ok(None);
        };

        let mut metadata = thread.metadata;
        metadata.insert(WORKING_MEMORY_KEY.to_string(), Value::String(memory.clone()));
        self.storage
            .update_thread(&thread.id, Some(thread.title.unwrap_or_default()), metadata)
            .await?;
        debug!(thread_id = %thread.id, "working memory replaced");
        Ok(Some(memory))
    }

    /// Builds and persists a single message.
    ///
    /// Returns `None` when the message was dropped as working-memory traffic.
    pub async fn add_message(&self, args: AddMessageArgs) -> Result<Option<Message>, RecallError> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: args.thread_id,
            resource_id: args.resource_id,
            role: args.role,
            content: args.content,
            kind: args.kind,
            created_at: Utc::now(),
            tool_names: args.tool_names,
            tool_call_args: args.tool_call_args,
            tool_call_ids: args.tool_call_ids,
        };
        let saved = self
            .save_messages(SaveMessagesArgs {
                messages: vec![message],
                memory_config: None,
            })
            .await?;
        Ok(saved.into_iter().next())
    }

    // --- Threads ---

    pub async fn create_thread(&self, args: CreateThreadArgs) -> Result<Thread, RecallError> {
        let now = Utc::now();
        let thread = Thread {
            id: args
                .thread_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            resource_id: args.resource_id,
            title: Some(args.title.unwrap_or_else(|| {
                format!(
                    "New Thread {}",
                    now.to_rfc3339_opts(SecondsFormat::Millis, true)
                )
            })),
            created_at: now,
            updated_at: now,
            metadata: args.metadata.unwrap_or_default(),
        };
        self.save_thread(thread, args.memory_config.as_ref()).await
    }

    /// Saves a thread, seeding working memory from the template when it is
    /// enabled and the thread has none.
    pub async fn save_thread(
        &self,
        mut thread: Thread,
        memory_config: Option<&MemoryOptions>,
    ) -> Result<Thread, RecallError> {
        let config = self.thread_config(memory_config);
        if config.working_memory.enabled && thread.working_memory().is_none() {
            let template = config
                .working_memory
                .template
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
            thread
                .metadata
                .insert(WORKING_MEMORY_KEY.to_string(), Value::String(template));
        }
        self.storage.save_thread(thread).await
    }

    pub async fn update_thread(
        &self,
        thread_id: &str,
        title: Option<String>,
        metadata: Map<String, Value>,
    ) -> Result<Thread, RecallError> {
        self.storage.update_thread(thread_id, title, metadata).await
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), RecallError> {
        self.storage.delete_thread(thread_id).await
    }

    pub async fn get_thread_by_id(&self, thread_id: &str) -> Result<Option<Thread>, RecallError> {
        self.storage.get_thread_by_id(thread_id).await
    }

    pub async fn get_threads_by_resource_id(
        &self,
        resource_id: &str,
    ) -> Result<Vec<Thread>, RecallError> {
        self.storage.get_threads_by_resource_id(resource_id).await
    }

    // --- Working memory ---

    /// Current working memory of a thread, trimmed.
    ///
    /// Falls back to the configured template, then the built-in one. `None`
    /// when working memory is disabled.
    pub async fn get_working_memory(
        &self,
        thread_id: &str,
        memory_config: Option<&MemoryOptions>,
    ) -> Result<Option<String>, RecallError> {
        let config = self.thread_config(memory_config);
        if !config.working_memory.enabled {
            return Ok(None);
        }
        let thread = self.storage.get_thread_by_id(thread_id).await?;
        let memory = thread
            .as_ref()
            .and_then(Thread::working_memory)
            .or(config.working_memory.template.as_deref())
            .unwrap_or(DEFAULT_TEMPLATE);
        Ok(Some(memory.trim().to_string()))
    }

    /// The working-memory instruction for the next model call, if any.
    pub async fn get_system_message(
        &self,
        thread_id: &str,
        memory_config: Option<&MemoryOptions>,
    ) -> Result<Option<String>, RecallError> {
        let config = self.thread_config(memory_config);
        let Some(memory) = self.get_working_memory(thread_id, memory_config).await? else {
            return Ok(None);
        };
        Ok(Some(match config.working_memory.mode {
            WorkingMemoryMode::ToolCall => tool_call_instruction(&memory),
            WorkingMemoryMode::TextStream => text_stream_instruction(&memory),
        }))
    }

    /// Tools the model should be offered: the working-memory update tool in
    /// tool-call mode, nothing otherwise.
    pub fn get_tools(&self, memory_config: Option<&MemoryOptions>) -> Vec<Arc<dyn Tool>> {
        if !self.thread_config(memory_config).uses_working_memory_tool() {
            return Vec::new();
        }
        let tool: Arc<dyn Tool> = Arc::new(UpdateWorkingMemoryTool::new(Arc::clone(&self.storage)));
        vec![tool]
    }

    // --- Embeddings ---

    /// Creates (or validates) the message index for `dimension` and returns
    /// its name.
    pub async fn create_embedding_index(&self, dimension: usize) -> Result<String, RecallError> {
        let vector = self.vector.as_ref().ok_or_else(|| {
            RecallError::Config(
                "Tried to create embedding index but no vector db is attached to this Memory instance."
                    .into(),
            )
        })?;
        let index_name = embedding_index_name(dimension);
        vector
            .create_index(CreateIndexParams::new(index_name.clone(), dimension))
            .await?;
        Ok(index_name)
    }

    async fn embed(&self, text: &str) -> Result<Arc<Embedded>, RecallError> {
        let cache = self.embeddings.as_ref().ok_or_else(|| {
            RecallError::Config(
                "Tried to embed message content but this Memory instance doesn't have an attached embedder."
                    .into(),
            )
        })?;
        cache.embed(text).await
    }

    fn require_vector(&self) -> Result<&Arc<dyn VectorAdapter>, RecallError> {
        self.vector.as_ref().ok_or_else(|| {
            RecallError::Config(
                "semantic recall is enabled but this Memory instance doesn't have an attached vector db."
                    .into(),
            )
        })
    }

    // --- Processing ---

    /// Runs the instance's processor chain over `messages`.
    pub fn process_messages(&self, messages: Vec<Message>, context: &ProcessorContext) -> Vec<Message> {
        apply_processors(messages, &self.processors, context)
    }

    /// Runs a caller-supplied processor chain instead of the instance's.
    pub fn process_messages_with(
        &self,
        messages: Vec<Message>,
        processors: &[Arc<dyn MessageProcessor>],
        context: &ProcessorContext,
    ) -> Vec<Message> {
        apply_processors(messages, processors, context)
    }
}

/// Text to embed for a message: non-blank plain text as is, or the text parts
/// joined by spaces.
fn embeddable_text(message: &Message) -> Option<String> {
    let text = match &message.content {
        MessageContent::Text(text) => text.clone(),
        parts @ MessageContent::Parts(_) => parts.flatten_text(" ").trim().to_string(),
    };
    (!text.trim().is_empty()).then_some(text)
}

#[cfg(feature = "local-embedder")]
fn local_embedder(config: &RecallConfig) -> Result<Arc<dyn EmbeddingAdapter>, RecallError> {
    let manager = crate::model_manager::ModelManager::from_config(&config.embedding)?;
    Ok(Arc::new(crate::embedder::OnnxEmbedder::new(manager)))
}

#[cfg(not(feature = "local-embedder"))]
fn local_embedder(_config: &RecallConfig) -> Result<Arc<dyn EmbeddingAdapter>, RecallError> {
    Err(RecallError::Config(
        "embedding.provider = \"local\" requires the `local-embedder` feature".into(),
    ))
}
