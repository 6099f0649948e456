#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use scatterbrain::embedding::{Encoder, EncoderProvider, EncoderSpec, TokenCodec};
use scatterbrain::pipeline::{ChunkParams, Row};
use scatterbrain::plot::PlotOptions;
use scatterbrain::projection::Projector;
use scatterbrain::Session;

pub const TEST_MODEL: &str = "test-org/tiny-encoder";
pub const NATIVE_DIMS: usize = 8;

/// One token per character, so chunk boundaries are easy to reason about.
pub struct CharCodec;

impl TokenCodec for CharCodec {
    fn encode_ids(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.chars().map(u32::from).collect())
    }

    fn decode_ids(&self, ids: &[u32]) -> Result<String> {
        Ok(ids.iter().filter_map(|&id| char::from_u32(id)).collect())
    }
}

/// Deterministic bag-of-characters encoder. Truncates input to `max_tokens`
/// characters the way a real model truncates to its context window.
pub struct HashEncoder {
    pub dims: usize,
    pub max_tokens: usize,
    codec: CharCodec,
}

impl HashEncoder {
    pub fn new(dims: usize, max_tokens: usize) -> Self {
        Self {
            dims,
            max_tokens,
            codec: CharCodec,
        }
    }
}

impl Encoder for HashEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; NATIVE_DIMS];
        for c in text.chars().take(self.max_tokens) {
            v[u32::from(c) as usize % NATIVE_DIMS] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v.truncate(self.dims);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn tokenizer(&self) -> &dyn TokenCodec {
        &self.codec
    }
}

/// Provider backed by [`HashEncoder`] with a toggleable "cache".
#[derive(Default)]
pub struct FakeProvider {
    pub cached: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub fail_load: AtomicBool,
    pub loads: AtomicUsize,
}

impl FakeProvider {
    pub fn cached() -> Arc<Self> {
        let provider = Self::default();
        provider.cached.store(true, Ordering::SeqCst);
        Arc::new(provider)
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn build(&self, spec: &EncoderSpec) -> Box<dyn Encoder> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let dims = spec.dimensions.unwrap_or(NATIVE_DIMS).min(NATIVE_DIMS);
        Box::new(HashEncoder::new(dims, 16))
    }
}

impl EncoderProvider for FakeProvider {
    fn load_cached(&self, spec: &EncoderSpec) -> Result<Option<Box<dyn Encoder>>> {
        if self.fail_load.load(Ordering::SeqCst) {
            bail!("corrupt model files for {}", spec.model);
        }
        if !self.cached.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.build(spec)))
    }

    fn fetch_and_load(&self, spec: &EncoderSpec) -> Result<Box<dyn Encoder>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            bail!("network unreachable");
        }
        self.cached.store(true, Ordering::SeqCst);
        Ok(self.build(spec))
    }
}

/// Keeps the leading `target_dims` components of every input.
pub struct SliceProjector;

impl Projector for SliceProjector {
    fn min_samples(&self, _n: usize) -> usize {
        2
    }

    fn fit_transform(&self, data: &[&[f32]], target_dims: usize) -> Result<Vec<Vec<f32>>> {
        Ok(data.iter().map(|row| row[..target_dims].to_vec()).collect())
    }
}

pub fn test_spec() -> EncoderSpec {
    EncoderSpec {
        model: TEST_MODEL.to_string(),
        dimensions: None,
    }
}

/// Session over `provider` with 16-token chunks overlapping by 4.
pub fn session_with(provider: Arc<FakeProvider>) -> Session {
    Session::new(
        provider,
        Arc::new(SliceProjector),
        ChunkParams::new(16, 4).unwrap(),
        PlotOptions::default(),
    )
    .with_default_encoder(Some(test_spec()))
}

pub fn test_session() -> Session {
    session_with(FakeProvider::cached())
}

pub fn row(text: &str, category: &str) -> Row {
    [("text", text), ("category", category)].into_iter().collect()
}
