//! Text-to-vector encoding collaborators.
//!
//! The pipeline only sees the [`Encoder`] and [`EncoderProvider`] traits. The
//! local implementation ([`local::OnnxEncoderProvider`]) runs sentence-transformer
//! ONNX exports through ONNX Runtime; [`download`] fetches their files.

pub mod download;
pub mod local;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Which model to load and how many output dimensions to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSpec {
    /// Hub-style identifier, e.g. `sentence-transformers/all-MiniLM-L6-v2`.
    pub model: String,
    /// Truncate output vectors to this many leading components.
    pub dimensions: Option<usize>,
}

/// Availability of the configured encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderAvailability {
    NotSpecified,
    NotDownloaded,
    Loaded,
}

/// Token-level view of the model's tokenizer, used for chunking.
pub trait TokenCodec: Send + Sync {
    /// Tokenize without truncation. Special tokens are included.
    fn encode_ids(&self, text: &str) -> Result<Vec<u32>>;

    /// Detokenize, stripping special/control tokens.
    fn decode_ids(&self, ids: &[u32]) -> Result<String>;
}

/// A loaded text encoder producing vectors of a fixed dimension.
///
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait Encoder: Send + Sync {
    /// Encode a single text. Over-length input is truncated by the encoder.
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode a batch of texts, preserving input order.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }

    /// Dimension of every vector this encoder returns.
    fn dimensions(&self) -> usize;

    fn tokenizer(&self) -> &dyn TokenCodec;
}

/// Loads encoders, either from the local cache only or after fetching them.
pub trait EncoderProvider: Send + Sync {
    /// Load from local files only. `Ok(None)` means the model is not cached.
    fn load_cached(&self, spec: &EncoderSpec) -> Result<Option<Box<dyn Encoder>>>;

    /// Retrieve the model files (network) and load them.
    fn fetch_and_load(&self, spec: &EncoderSpec) -> Result<Box<dyn Encoder>>;
}

/// Create an encoder provider from config.
///
/// Currently only `"local"` is supported (ONNX Runtime + sentence-transformer exports).
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EncoderProvider>> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(local::OnnxEncoderProvider::new(config))),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// Truncate a vector to `dimensions` leading components, matryoshka style.
pub(crate) fn truncate_dims(mut v: Vec<f32>, dimensions: Option<usize>) -> Vec<f32> {
    if let Some(d) = dimensions {
        v.truncate(d);
    }
    v
}
