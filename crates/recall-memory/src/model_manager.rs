// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Download and path resolution for the local embedding model.
//!
//! all-MiniLM-L6-v2 (INT8 quantized) and its tokenizer are fetched from
//! HuggingFace the first time the local embedder runs and reused afterwards.

use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::info;

use recall_config::model::EmbeddingConfig;
use recall_core::RecallError;

const MODEL_URL: &str = "https://huggingface.co/onnx-community/all-MiniLM-L6-v2-ONNX/resolve/main/onnx/model_quantized.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Directory name of the local model under the data directory.
pub const MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Locates, and on first use downloads, the local model files.
pub struct ModelManager {
    model_dir: PathBuf,
    model_url: String,
    tokenizer_url: String,
    ready: OnceCell<PathBuf>,
}

impl ModelManager {
    /// Manages model files kept directly in `model_dir`.
    pub fn new(model_dir: PathBuf) -> Self {
        Self {
            model_dir,
            model_url: MODEL_URL.to_string(),
            tokenizer_url: TOKENIZER_URL.to_string(),
            ready: OnceCell::new(),
        }
    }

    /// Uses `embedding.model_dir` when set, else the platform data directory.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, RecallError> {
        let model_dir = match &config.model_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| {
                    RecallError::Config("no data directory available for the embedding model".into())
                })?
                .join("recall")
                .join("models")
                .join(MODEL_NAME),
        };
        Ok(Self::new(model_dir))
    }

    /// Overrides the download sources (for testing with wiremock).
    #[cfg(test)]
    pub fn with_sources(mut self, model_url: String, tokenizer_url: String) -> Self {
        self.model_url = model_url;
        self.tokenizer_url = tokenizer_url;
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join("model.onnx")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir.join("tokenizer.json")
    }

    /// Returns true if both model and tokenizer files exist.
    pub fn is_model_available(&self) -> bool {
        self.model_path().exists() && self.tokenizer_path().exists()
    }

    /// Ensures the model files are on disk and returns the model path.
    ///
    /// Concurrent callers share one download. A failed download leaves no
    /// partial file behind and is attempted again by the next call.
    pub async fn ensure_model(&self) -> Result<PathBuf, RecallError> {
        self.ready
            .get_or_try_init(|| self.fetch_missing())
            .await
            .cloned()
    }

    async fn fetch_missing(&self) -> Result<PathBuf, RecallError> {
        if self.is_model_available() {
            return Ok(self.model_path());
        }

        info!(dir = %self.model_dir.display(), "embedding model not found, downloading");
        tokio::fs::create_dir_all(&self.model_dir)
            .await
            .map_err(|e| embedding_error(format!("failed to create model directory: {e}")))?;

        let files = [
            (self.model_path(), self.model_url.as_str()),
            (self.tokenizer_path(), self.tokenizer_url.as_str()),
        ];
        for (dest, url) in &files {
            if dest.exists() {
                continue;
            }
            match download_file(url, dest).await {
                Ok(size) => info!(file = %dest.display(), size, "downloaded model file"),
                Err(e) => {
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(e);
                }
            }
        }

        info!(dir = %self.model_dir.display(), "embedding model ready");
        Ok(self.model_path())
    }
}

fn embedding_error(message: String) -> RecallError {
    RecallError::Embedding {
        message,
        source: None,
    }
}

async fn download_file(url: &str, dest: &Path) -> Result<usize, RecallError> {
    let response = reqwest::get(url).await.map_err(|e| RecallError::Embedding {
        message: format!("failed to download {url}: {e}"),
        source: Some(Box::new(e)),
    })?;

    if !response.status().is_success() {
        return Err(embedding_error(format!(
            "download failed with status {}: {url}",
            response.status()
        )));
    }

    let bytes = response.bytes().await.map_err(|e| RecallError::Embedding {
        message: format!("failed to read response body from {url}: {e}"),
        source: Some(Box::new(e)),
    })?;

    tokio::fs::write(dest, &bytes)
        .await
        .map_err(|e| embedding_error(format!("failed to write {}: {e}", dest.display())))?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn paths_live_in_the_model_dir() {
        let mgr = ModelManager::new(PathBuf::from("/data/models/mini"));
        assert_eq!(mgr.model_path(), PathBuf::from("/data/models/mini/model.onnx"));
        assert_eq!(
            mgr.tokenizer_path(),
            PathBuf::from("/data/models/mini/tokenizer.json")
        );
    }

    #[test]
    fn configured_dir_wins() {
        let config = EmbeddingConfig {
            model_dir: Some("/opt/recall/model".into()),
            ..EmbeddingConfig::default()
        };
        let mgr = ModelManager::from_config(&config).unwrap();
        assert_eq!(mgr.model_dir(), Path::new("/opt/recall/model"));
    }

    #[test]
    fn model_not_available_when_missing() {
        let mgr = ModelManager::new(PathBuf::from("/nonexistent/path"));
        assert!(!mgr.is_model_available());
    }

    #[tokio::test]
    async fn downloads_missing_files_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model.onnx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"onnx".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tokenizer.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mgr = ModelManager::new(dir.path().join("mini")).with_sources(
            format!("{}/model.onnx", server.uri()),
            format!("{}/tokenizer.json", server.uri()),
        );

        let first = mgr.ensure_model().await.unwrap();
        let second = mgr.ensure_model().await.unwrap();
        assert_eq!(first, second);
        assert!(mgr.is_model_available());
        assert_eq!(std::fs::read(mgr.model_path()).unwrap(), b"onnx");
    }

    #[tokio::test]
    async fn failed_download_leaves_no_partial_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mgr = ModelManager::new(dir.path().join("mini")).with_sources(
            format!("{}/model.onnx", server.uri()),
            format!("{}/tokenizer.json", server.uri()),
        );

        let err = mgr.ensure_model().await.unwrap_err();
        assert!(err.to_string().contains("404"), "got: {err}");
        assert!(!mgr.model_path().exists());
    }
}
