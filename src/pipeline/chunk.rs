//! Overlapping token windows for text longer than the encoder context.

use std::ops::Range;

use crate::config::ChunkingConfig;
use crate::embedding::TokenCodec;
use crate::error::{PipelineError, Result};

/// Window size and overlap, both in tokens. Always `overlap_tokens < max_tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    max_tokens: usize,
    overlap_tokens: usize,
}

impl ChunkParams {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(PipelineError::Configuration(
                "max_tokens must be greater than zero".into(),
            ));
        }
        if overlap_tokens >= max_tokens {
            return Err(PipelineError::Configuration(format!(
                "overlap_tokens ({overlap_tokens}) must be smaller than max_tokens ({max_tokens})"
            )));
        }
        Ok(Self {
            max_tokens,
            overlap_tokens,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.max_tokens, config.overlap_tokens)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    fn stride(&self) -> usize {
        self.max_tokens - self.overlap_tokens
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 20,
        }
    }
}

/// Token ranges of the windows covering `len` tokens.
///
/// Window `i` starts at `i * (max_tokens - overlap_tokens)`; windows stop as soon
/// as one reaches the end of the sequence. Tail windows lying wholly inside the
/// last emitted one are not produced, unlike stepping a start offset over every
/// stride up to `len`: 1000 tokens at 512/20 give `[0..512, 492..1000]`, not an
/// extra `984..1000` that would double-weight the tail in an average.
pub fn window_ranges(len: usize, params: &ChunkParams) -> Vec<Range<usize>> {
    if len <= params.max_tokens {
        return vec![0..len];
    }
    let mut ranges = Vec::with_capacity(len / params.stride() + 1);
    let mut start = 0;
    loop {
        let end = (start + params.max_tokens).min(len);
        ranges.push(start..end);
        if end == len {
            break;
        }
        start += params.stride();
    }
    ranges
}

/// Split `text` into overlapping segments of at most `max_tokens` tokens.
///
/// Text that fits is returned unchanged as the only segment.
pub fn chunk(tokenizer: &dyn TokenCodec, text: &str, params: &ChunkParams) -> Result<Vec<String>> {
    let ids = tokenizer
        .encode_ids(text)
        .map_err(PipelineError::encoding)?;
    if ids.len() <= params.max_tokens {
        return Ok(vec![text.to_string()]);
    }

    let segments = window_ranges(ids.len(), params)
        .into_iter()
        .map(|range| tokenizer.decode_ids(&ids[range]))
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(PipelineError::encoding)?;

    tracing::info!(
        tokens = ids.len(),
        chunks = segments.len(),
        "text split into chunks"
    );
    for (i, segment) in segments.iter().enumerate() {
        tracing::debug!(chunk = i, text = %segment, "chunk");
    }
    Ok(segments)
}
