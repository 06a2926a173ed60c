// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content-addressed embedding cache.
//!
//! Text is chunked, embedded in one provider call, and memoized under a
//! CRC-32 of the raw text for the lifetime of the cache. Entries are never
//! evicted.
//!
//! When the provider is the process-local default model, the first call's
//! in-flight future is kept and every call that starts while it runs awaits
//! that same future before issuing its own request, so the model's cold start
//! happens once.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

use recall_core::types::{EmbeddingInput, EmbeddingOutput};
use recall_core::{EmbeddingAdapter, PluginAdapter, RecallError};

use crate::chunker::{DEFAULT_CHUNK_TOKENS, chunk_text};

/// Chunks of one text and their vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    /// One vector per chunk, in chunk order.
    pub embeddings: Vec<Vec<f32>>,
    pub chunks: Vec<String>,
    /// Width of every vector; 0 when the text had no chunks.
    pub dimension: usize,
}

type FirstEmbed = Shared<BoxFuture<'static, Result<EmbeddingOutput, Arc<RecallError>>>>;

/// Cache key for a text.
pub fn content_hash(text: &str) -> u32 {
    crc32fast::hash(text.as_bytes())
}

/// Memoizing front for an embedding provider.
pub struct EmbeddingCache {
    embedder: Arc<dyn EmbeddingAdapter>,
    max_retries: u32,
    chunk_tokens: usize,
    entries: DashMap<u32, Arc<Embedded>>,
    /// Key and in-flight future of the first local-default call.
    first_embed: Mutex<Option<(u32, FirstEmbed)>>,
}

impl EmbeddingCache {
    pub fn new(embedder: Arc<dyn EmbeddingAdapter>, max_retries: u32) -> Self {
        Self {
            embedder,
            max_retries,
            chunk_tokens: DEFAULT_CHUNK_TOKENS,
            entries: DashMap::new(),
            first_embed: Mutex::new(None),
        }
    }

    /// Overrides the per-chunk token budget.
    pub fn with_chunk_tokens(mut self, chunk_tokens: usize) -> Self {
        self.chunk_tokens = chunk_tokens;
        self
    }

    /// Number of memoized texts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embeds `text`, reusing a previous result for identical text.
    pub async fn embed(&self, text: &str) -> Result<Arc<Embedded>, RecallError> {
        let key = content_hash(text);
        if let Some(hit) = self.entries.get(&key) {
            debug!(key, "embedding cache hit");
            return Ok(Arc::clone(hit.value()));
        }

        let chunks = chunk_text(text, self.chunk_tokens);
        if chunks.is_empty() {
            return Ok(Arc::new(Embedded {
                embeddings: Vec::new(),
                chunks,
                dimension: 0,
            }));
        }

        let output = if self.embedder.is_local_default() {
            self.embed_behind_first_call(key, &chunks).await?
        } else {
            match self.entries.get(&key) {
                Some(hit) => return Ok(Arc::clone(hit.value())),
                None => self.call_provider(chunks.clone()).await?,
            }
        };

        let embedded = Arc::new(self.assemble(output, chunks)?);
        self.entries.insert(key, Arc::clone(&embedded));
        debug!(
            key,
            chunks = embedded.chunks.len(),
            dimension = embedded.dimension,
            "embedding cached"
        );
        Ok(embedded)
    }

    async fn embed_behind_first_call(
        &self,
        key: u32,
        chunks: &[String],
    ) -> Result<EmbeddingOutput, RecallError> {
        let (gate, shares_output) = {
            let mut slot = self
                .first_embed
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some((gate_key, gate)) => (gate.clone(), *gate_key == key),
                None => {
                    let embedder = Arc::clone(&self.embedder);
                    let input = self.input(chunks.to_vec());
                    let gate = async move { embedder.embed(input).await.map_err(Arc::new) }
                        .boxed()
                        .shared();
                    *slot = Some((key, gate.clone()));
                    (gate, true)
                }
            }
        };

        // The owner of the first call, and anyone asking for the same text,
        // takes its output directly.
        if shares_output {
            debug!("awaiting first embedding call on the local default model");
            return match gate.await {
                Ok(output) => Ok(output),
                Err(err) => {
                    // Let the next caller retry the cold start.
                    self.first_embed
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    Err(shared_error(&err))
                }
            };
        }

        gate.await.map_err(|err| shared_error(&err))?;
        match self.entries.get(&key) {
            Some(hit) => Ok(EmbeddingOutput {
                embeddings: hit.embeddings.clone(),
                dimensions: hit.dimension,
            }),
            None => self.call_provider(chunks.to_vec()).await,
        }
    }

    fn input(&self, texts: Vec<String>) -> EmbeddingInput {
        EmbeddingInput {
            texts,
            max_retries: self.max_retries,
        }
    }

    async fn call_provider(&self, chunks: Vec<String>) -> Result<EmbeddingOutput, RecallError> {
        self.embedder.embed(self.input(chunks)).await
    }

    fn assemble(
        &self,
        output: EmbeddingOutput,
        chunks: Vec<String>,
    ) -> Result<Embedded, RecallError> {
        if output.embeddings.len() != chunks.len() {
            return Err(RecallError::Embedding {
                message: format!(
                    "{} returned {} embeddings for {} chunks",
                    self.embedder.name(),
                    output.embeddings.len(),
                    chunks.len()
                ),
                source: None,
            });
        }
        let dimension = output
            .embeddings
            .first()
            .map_or(output.dimensions, Vec::len);
        Ok(Embedded {
            embeddings: output.embeddings,
            chunks,
            dimension,
        })
    }
}

fn shared_error(err: &RecallError) -> RecallError {
    RecallError::Embedding {
        message: format!("initial embedding call failed: {err}"),
        source: None,
    }
}
