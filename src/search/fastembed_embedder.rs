use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::log_info;
use crate::search::embedder::{EmbedError, Embedder};

const ENABLE_LOGS: bool = true;

const MINILM_DIMENSION: usize = 384;

/// all-MiniLM-L6-v2 through ONNX Runtime. The model is fetched into the
/// fastembed cache on first use.
pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedEmbedder {
    pub fn new() -> Result<Self, EmbedError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|err| EmbedError::Unavailable(err.to_string()))?;

        log_info!("Loaded all-MiniLM-L6-v2 embedding model");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for FastEmbedEmbedder {
    fn name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }

    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let model = self
            .model
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        model
            .embed(texts.to_vec(), None)
            .map_err(|err| EmbedError::Unavailable(err.to_string()))
    }
}
