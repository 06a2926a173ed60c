// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local ONNX embedder: all-MiniLM-L6-v2 on CPU.
//!
//! This is the default embedder. The model is fetched and loaded on the
//! first embedding call, so constructing one is free and the cold start is
//! paid by whoever embeds first.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;
use tokio::sync::OnceCell;
use tracing::info;

use recall_core::traits::{EmbeddingAdapter, PluginAdapter};
use recall_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use recall_core::RecallError;

use crate::model_manager::ModelManager;

/// Embedding dimensions for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

struct LoadedModel {
    /// ONNX Runtime session (not Send, wrapped in Mutex for safety).
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
}

// Safety: Session is accessed through Mutex which provides synchronization.
// The tokenizer is thread-safe for encoding operations.
unsafe impl Send for LoadedModel {}
unsafe impl Sync for LoadedModel {}

fn model_error(message: String) -> RecallError {
    RecallError::Embedding {
        message,
        source: None,
    }
}

impl LoadedModel {
    fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self, RecallError> {
        let tokenizer = tokenizers::Tokenizer::from_file(tokenizer_path).map_err(|e| {
            model_error(format!(
                "failed to load tokenizer from {}: {e}",
                tokenizer_path.display()
            ))
        })?;

        let session = Session::builder()
            .map_err(|e| model_error(format!("failed to create ONNX session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| model_error(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(1)
            .map_err(|e| model_error(format!("failed to set thread count: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                model_error(format!(
                    "failed to load ONNX model from {}: {e}",
                    model_path.display()
                ))
            })?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, RecallError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| model_error(format!("tokenization failed: {e}")))?;

        let to_i64 = |values: &[u32]| values.iter().map(|&v| i64::from(v)).collect::<Vec<_>>();
        let input_ids = to_i64(encoding.get_ids());
        let attention_mask = to_i64(encoding.get_attention_mask());
        let token_type_ids = to_i64(encoding.get_type_ids());
        let seq_len = input_ids.len();

        let input_ids_array = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| shape_error("input_ids", e))?;
        let attention_mask_array = Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| shape_error("attention_mask", e))?;
        let token_type_ids_array = Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| shape_error("token_type_ids", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| model_error(format!("failed to lock ONNX session: {e}")))?;

        let input_ids_tensor = TensorRef::from_array_view(&input_ids_array)
            .map_err(|e| tensor_error("input_ids", e))?;
        let attention_mask_tensor = TensorRef::from_array_view(&attention_mask_array)
            .map_err(|e| tensor_error("attention_mask", e))?;
        let token_type_ids_tensor = TensorRef::from_array_view(&token_type_ids_array)
            .map_err(|e| tensor_error("token_type_ids", e))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            ])
            .map_err(|e| model_error(format!("ONNX inference failed: {e}")))?;

        // Output shape is [1, seq_len, hidden].
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| model_error(format!("failed to extract output tensor: {e}")))?;
        let hidden_size = shape[shape.len() - 1] as usize;

        let pooled = mean_pool_with_attention(data, &attention_mask, seq_len, hidden_size);
        Ok(l2_normalize(&pooled))
    }
}

fn shape_error(name: &str, e: impl std::fmt::Display) -> RecallError {
    model_error(format!("failed to create {name} tensor: {e}"))
}

fn tensor_error(name: &str, e: impl std::fmt::Display) -> RecallError {
    model_error(format!("failed to create {name} TensorRef: {e}"))
}

/// Attention-masked mean pooling over token embeddings.
fn mean_pool_with_attention(
    embeddings: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (i, &mask) in attention_mask.iter().enumerate().take(seq_len) {
        if mask > 0 {
            let token = &embeddings[i * hidden_size..(i + 1) * hidden_size];
            for (acc, value) in sum.iter_mut().zip(token) {
                *acc += value;
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for val in &mut sum {
            *val /= count;
        }
    }
    sum
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vec.iter().map(|v| v / norm).collect()
    } else {
        vec.to_vec()
    }
}

/// The process-local default embedder.
pub struct OnnxEmbedder {
    manager: ModelManager,
    model: OnceCell<LoadedModel>,
}

impl OnnxEmbedder {
    /// Creates an embedder that loads its model through `manager` on first use.
    pub fn new(manager: ModelManager) -> Self {
        Self {
            manager,
            model: OnceCell::new(),
        }
    }

    async fn model(&self) -> Result<&LoadedModel, RecallError> {
        self.model
            .get_or_try_init(|| async {
                let model_path = self.manager.ensure_model().await?;
                let model = LoadedModel::load(&model_path, &self.manager.tokenizer_path())?;
                info!(path = %model_path.display(), "local embedding model loaded");
                Ok::<_, RecallError>(model)
            })
            .await
    }
}

#[async_trait]
impl PluginAdapter for OnnxEmbedder {
    fn name(&self) -> &str {
        "onnx-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        match self.model.get() {
            None => Ok(HealthStatus::Degraded("model not loaded yet".into())),
            Some(model) => match model.session.lock() {
                Ok(_) => Ok(HealthStatus::Healthy),
                Err(e) => Ok(HealthStatus::Unhealthy(format!("session lock poisoned: {e}"))),
            },
        }
    }

    async fn shutdown(&self) -> Result<(), RecallError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OnnxEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RecallError> {
        let model = self.model().await?;
        let embeddings = input
            .texts
            .iter()
            .map(|text| model.embed_text(text))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EmbeddingOutput {
            embeddings,
            dimensions: EMBEDDING_DIM,
        })
    }

    fn is_local_default(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn l2_normalize_general_vector() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 0.001);
        assert!((n[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn mean_pool_skips_padding() {
        let embeddings = vec![
            0.0, 0.0, 0.0, // padding
            1.0, 2.0, 3.0,
        ];
        let result = mean_pool_with_attention(&embeddings, &[0, 1], 2, 3);
        assert_eq!(result, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn mean_pool_averages_real_tokens() {
        let embeddings = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let result = mean_pool_with_attention(&embeddings, &[1, 1, 1], 3, 2);
        assert!((result[0] - 3.0).abs() < f32::EPSILON);
        assert!((result[1] - 4.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn reports_itself_as_local_default_without_loading() {
        let embedder = OnnxEmbedder::new(ModelManager::new(PathBuf::from("/nonexistent")));
        assert!(embedder.is_local_default());
        assert_eq!(embedder.name(), "onnx-embedder");
        assert!(matches!(
            embedder.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
