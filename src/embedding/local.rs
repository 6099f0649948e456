//! Local ONNX Runtime encoder.
//!
//! Implements [`Encoder`] for sentence-transformer ONNX exports via `ort`.
//! Handles tokenization, inference, mean pooling, L2 normalization and
//! optional output truncation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{download, truncate_dims, Encoder, EncoderProvider, EncoderSpec, TokenCodec};
use crate::config::EmbeddingConfig;

const PROBE_TEXT: &str = "dimension probe";

/// Loads [`OnnxEncoder`]s from `<cache_dir>/<model-dir>/`.
pub struct OnnxEncoderProvider {
    cache_dir: PathBuf,
    base_url: String,
    max_seq_len: usize,
}

impl OnnxEncoderProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            cache_dir: crate::config::expand_tilde(&config.cache_dir),
            base_url: config.base_url.clone(),
            max_seq_len: config.max_seq_len,
        }
    }

    pub fn model_dir(&self, model: &str) -> PathBuf {
        download::model_dir(&self.cache_dir, model)
    }
}

impl EncoderProvider for OnnxEncoderProvider {
    fn load_cached(&self, spec: &EncoderSpec) -> Result<Option<Box<dyn Encoder>>> {
        let dir = self.model_dir(&spec.model);
        if !download::is_cached(&dir) {
            tracing::info!(model = %spec.model, dir = %dir.display(), "model not in local cache");
            return Ok(None);
        }
        let encoder = OnnxEncoder::load(&dir, self.max_seq_len, spec.dimensions)?;
        Ok(Some(Box::new(encoder)))
    }

    /// Must be called from a blocking context (e.g. `spawn_blocking`) when a
    /// tokio runtime is running.
    fn fetch_and_load(&self, spec: &EncoderSpec) -> Result<Box<dyn Encoder>> {
        let fetch = download::fetch_model(&self.base_url, &self.cache_dir, &spec.model, false);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle.block_on(fetch)?,
            Err(_) => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to build download runtime")?
                .block_on(fetch)?,
        };
        let dir = self.model_dir(&spec.model);
        let encoder = OnnxEncoder::load(&dir, self.max_seq_len, spec.dimensions)?;
        Ok(Box::new(encoder))
    }
}

/// Non-truncating tokenizer used for chunking.
struct ChunkTokenizer(Tokenizer);

impl TokenCodec for ChunkTokenizer {
    fn encode_ids(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .0
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode_ids(&self, ids: &[u32]) -> Result<String> {
        self.0
            .decode(ids, true)
            .map_err(|e| anyhow::anyhow!("detokenization failed: {e}"))
    }
}

/// Sentence encoder backed by an ONNX Runtime session.
pub struct OnnxEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    chunk_tokenizer: ChunkTokenizer,
    native_dim: usize,
    dimensions: Option<usize>,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for OnnxEncoder {}
unsafe impl Sync for OnnxEncoder {}

impl OnnxEncoder {
    pub fn load(model_dir: &Path, max_seq_len: usize, dimensions: Option<usize>) -> Result<Self> {
        let model_path = model_dir.join(download::MODEL_FILE);
        let tokenizer_path = model_dir.join(download::TOKENIZER_FILE);

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `scatterbrain model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `scatterbrain model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut plain = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
        plain
            .with_truncation(None)
            .map_err(|e| anyhow::anyhow!("failed to clear truncation: {e}"))?;
        plain.with_padding(None);

        let mut tokenizer = plain.clone();
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(tokenizer = %tokenizer_path.display(), max_seq_len, "tokenizer loaded");

        let mut encoder = Self {
            session: Mutex::new(session),
            tokenizer,
            chunk_tokenizer: ChunkTokenizer(plain),
            native_dim: 0,
            dimensions: None,
        };

        let probe = encoder.run(&[PROBE_TEXT])?;
        encoder.native_dim = probe.first().map(Vec::len).unwrap_or(0);
        anyhow::ensure!(encoder.native_dim > 0, "model produced empty embeddings");
        if let Some(d) = dimensions {
            anyhow::ensure!(
                d > 0 && d <= encoder.native_dim,
                "requested {d} dimensions but model produces {}",
                encoder.native_dim
            );
        }
        encoder.dimensions = dimensions;

        tracing::info!(
            native_dim = encoder.native_dim,
            dimensions = encoder.dimensions(),
            "encoder ready"
        );
        Ok(encoder)
    }

    /// Tokenize, run inference and mean-pool. Returns L2-normalized vectors at native size.
    fn run(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        // Step 1: Tokenize
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        // Step 2: Build flat input tensors as i64
        let mut input_ids_flat = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask_flat = Vec::with_capacity(batch_size * seq_len);

        for encoding in &encodings {
            input_ids_flat.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask_flat.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), input_ids_flat.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask_flat.clone().into_boxed_slice()))?;
        // token_type_ids: all zeros (single sentence, no segment B)
        let token_type_ids = vec![0i64; batch_size * seq_len];
        let token_type_ids_tensor =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        // Step 3: Run ONNX inference
        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })?;

        // Step 4: Extract token embeddings, shape [batch, seq_len, hidden].
        // The output name varies by ONNX export. Try common names, fall back to index 0.
        let token_emb_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .context("failed to extract token_embeddings tensor")?;

        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size,
            "unexpected token_embeddings shape: {dims:?}, expected [{batch_size}, seq, hidden]"
        );
        let hidden_dim = dims[2] as usize;
        let actual_seq_len = dims[1] as usize;

        // Step 5: Mean pooling with attention mask
        let mut results = Vec::with_capacity(batch_size);
        for b in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_dim];
            let mut count = 0.0f32;

            for s in 0..actual_seq_len.min(seq_len) {
                let mask = attention_mask_flat[b * seq_len + s] as f32;
                if mask > 0.0 {
                    let offset = (b * actual_seq_len + s) * hidden_dim;
                    for (d, acc) in sum.iter_mut().enumerate() {
                        *acc += data[offset + d] * mask;
                    }
                    count += mask;
                }
            }

            if count > 0.0 {
                for acc in sum.iter_mut() {
                    *acc /= count;
                }
            }

            // Step 6: L2 normalize
            results.push(l2_normalize(&sum));
        }

        Ok(results)
    }
}

impl Encoder for OnnxEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.encode_batch(&[text])?
            .into_iter()
            .next()
            .context("encoder returned no vector for a single input")
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.run(texts)?;
        Ok(vectors
            .into_iter()
            .map(|v| truncate_dims(v, self.dimensions))
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions.unwrap_or(self.native_dim)
    }

    fn tokenizer(&self) -> &dyn TokenCodec {
        &self.chunk_tokenizer
    }
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
