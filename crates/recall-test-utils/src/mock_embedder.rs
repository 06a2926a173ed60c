// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock embedding adapter for deterministic testing.
//!
//! `MockEmbedder` implements `EmbeddingAdapter` with a bag-of-words hash
//! embedding, so texts sharing words score close together without any model
//! download or network access.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use recall_core::types::{EmbeddingInput, EmbeddingOutput};
use recall_core::{AdapterType, EmbeddingAdapter, HealthStatus, PluginAdapter, RecallError};

/// Width of mock vectors unless overridden.
pub const MOCK_DIMENSION: usize = 64;

/// A deterministic embedder that counts how it is called.
pub struct MockEmbedder {
    dimension: usize,
    local_default: bool,
    delay: Option<Duration>,
    fail: AtomicBool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    last_max_retries: AtomicU32,
    batches: Mutex<Vec<Vec<String>>>,
}

impl MockEmbedder {
    /// Create a mock embedder producing [`MOCK_DIMENSION`]-wide vectors.
    pub fn new() -> Self {
        Self::with_dimension(MOCK_DIMENSION)
    }

    /// Create a mock embedder producing vectors of the given width.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            local_default: false,
            delay: None,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            last_max_retries: AtomicU32::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Report as the process-local default embedder.
    pub fn as_local_default(mut self) -> Self {
        self.local_default = true;
        self
    }

    /// Sleep this long inside every `embed` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every subsequent `embed` call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Number of `embed` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Largest number of `embed` calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// The retry budget passed with the most recent call.
    pub fn last_max_retries(&self) -> u32 {
        self.last_max_retries.load(Ordering::SeqCst)
    }

    /// Every batch of texts received, in call order.
    pub async fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().await.clone()
    }

    /// The vector this embedder produces for `text`.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);
        for word in words {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % self.dimension as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            vector.iter_mut().for_each(|v| *v /= norm);
        } else {
            vector[0] = 1.0;
        }
        vector
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecallError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RecallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_max_retries
            .store(input.max_retries, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.batches.lock().await.push(input.texts.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(RecallError::Embedding {
                message: "mock embedder configured to fail".into(),
                source: None,
            });
        }

        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.embed_text(t)).collect(),
            dimensions: self.dimension,
        })
    }

    fn is_local_default(&self) -> bool {
        self.local_default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn identical_texts_embed_identically() {
        let embedder = MockEmbedder::new();
        assert_eq!(
            embedder.embed_text("Rust ownership rules"),
            embedder.embed_text("rust OWNERSHIP rules")
        );
    }

    #[test]
    fn shared_words_score_higher_than_unrelated() {
        let embedder = MockEmbedder::new();
        let query = embedder.embed_text("favourite programming language");
        let related = embedder.embed_text("my favourite language is rust");
        let unrelated = embedder.embed_text("the weather is sunny today");
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn empty_text_still_has_unit_length() {
        let embedder = MockEmbedder::with_dimension(4);
        assert_eq!(embedder.embed_text("  "), vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn embed_counts_calls_and_records_batches() {
        let embedder = MockEmbedder::with_dimension(8);
        let output = embedder
            .embed(EmbeddingInput {
                texts: vec!["a".into(), "b".into()],
                max_retries: 5,
            })
            .await
            .unwrap();
        assert_eq!(output.embeddings.len(), 2);
        assert_eq!(output.dimensions, 8);
        assert_eq!(embedder.calls(), 1);
        assert_eq!(embedder.last_max_retries(), 5);
        assert_eq!(embedder.batches().await, vec![vec!["a", "b"]]);
    }

    #[tokio::test]
    async fn failing_embedder_returns_embedding_error() {
        let embedder = MockEmbedder::new();
        embedder.set_failing(true);
        let err = embedder
            .embed(EmbeddingInput {
                texts: vec!["x".into()],
                max_retries: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::Embedding { .. }));
    }
}
