// JURADOC E5 Embedder - multilingual E5 word embeddings via candle
// Loads the safetensors weights directly and mean-pools token vectors;
// dimension is discovered from the tensor shape at initialization

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use dashmap::DashMap;
use hf_hub::api::tokio::Api;
use std::path::PathBuf;
use tokenizers::Tokenizer;
use tracing::info;

use super::{mean_pool_and_normalize, EmbeddingError, EmbeddingResult, TextEmbedder};

const WORD_EMBEDDINGS_TENSOR: &str = "embeddings.word_embeddings.weight";

/// Configuration for the E5 embedder.
#[derive(Debug, Clone)]
pub struct E5Config {
    pub model_id: String,
    pub revision: String,
    pub cache_dir: Option<PathBuf>,
    pub max_sequence_length: usize,
}

impl Default for E5Config {
    fn default() -> Self {
        Self {
            model_id: "intfloat/multilingual-e5-small".to_string(),
            revision: "main".to_string(),
            cache_dir: None,
            max_sequence_length: 512,
        }
    }
}

/// E5 embedder over the raw word-embedding table. Tokenizes, gathers the
/// token rows, mean-pools and L2-normalizes; `query: `/`passage: ` prefixes
/// follow the E5 contract. Embeddings are cached by content hash.
pub struct E5Embedder {
    tokenizer: Tokenizer,
    embeddings: Tensor,
    vocab_size: usize,
    dimension: usize,
    max_sequence_length: usize,
    cache: DashMap<String, Vec<f32>>,
}

impl E5Embedder {
    /// Downloads tokenizer and weights from the hub (cached on disk) and
    /// extracts the word-embedding table.
    pub async fn new(config: E5Config) -> EmbeddingResult<Self> {
        info!(model = config.model_id, "Initializing E5 embedder");

        let api = Api::new().map_err(|e| EmbeddingError::Init(format!("hub api: {e}")))?;
        let repo = api.model(config.model_id.clone());

        let tokenizer_path = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| EmbeddingError::Init(format!("tokenizer download: {e}")))?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Init(format!("tokenizer load: {e}")))?;

        let weights_path = repo
            .get("model.safetensors")
            .await
            .map_err(|e| EmbeddingError::Init(format!("weights download: {e}")))?;

        let tensors = candle_core::safetensors::load(&weights_path, &Device::Cpu)
            .map_err(|e| EmbeddingError::Init(format!("safetensors load: {e}")))?;

        let embeddings = tensors
            .get(WORD_EMBEDDINGS_TENSOR)
            .cloned()
            .ok_or_else(|| {
                EmbeddingError::Init(format!("tensor {WORD_EMBEDDINGS_TENSOR} not found"))
            })?;

        let (vocab_size, dimension) = embeddings
            .dims2()
            .map_err(|e| EmbeddingError::Init(format!("unexpected tensor shape: {e}")))?;

        info!(vocab_size, dimension, "E5 embedder ready");

        Ok(Self {
            tokenizer,
            embeddings,
            vocab_size,
            dimension,
            max_sequence_length: config.max_sequence_length,
            cache: DashMap::new(),
        })
    }

    fn encode(&self, prefixed: &str) -> EmbeddingResult<Vec<f32>> {
        let cache_key = blake3::hash(prefixed.as_bytes()).to_hex().to_string();
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached.clone());
        }

        let encoding = self
            .tokenizer
            .encode(prefixed, true)
            .map_err(|e| EmbeddingError::Inference(format!("tokenization: {e}")))?;

        let mut rows: Vec<Vec<f32>> = Vec::new();
        for &token_id in encoding.get_ids().iter().take(self.max_sequence_length) {
            if (token_id as usize) >= self.vocab_size {
                continue;
            }
            let row = self
                .embeddings
                .get(token_id as usize)
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(|e| EmbeddingError::Inference(format!("tensor row: {e}")))?;
            rows.push(row);
        }

        let pooled = mean_pool_and_normalize(&rows, self.dimension);
        self.cache.insert(cache_key, pooled.clone());
        Ok(pooled)
    }

    /// Cache size and an estimate of its memory footprint in bytes.
    pub fn cache_stats(&self) -> (usize, usize) {
        let entries = self.cache.len();
        (entries, entries * self.dimension * std::mem::size_of::<f32>())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[async_trait]
impl TextEmbedder for E5Embedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_query(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        self.encode(&format!("query: {text}"))
    }

    async fn embed_passage(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        self.encode(&format!("passage: {text}"))
    }
}

// Model download makes this untestable offline; the pooling math is covered
// in the module tests and the trait seam by the pipeline tests.
