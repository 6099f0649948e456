//! Encoding policy on top of a raw [`Encoder`]: chunk-and-average for the
//! corpus, single-unit encoding for references and queries.

use crate::embedding::Encoder;
use crate::error::{PipelineError, Result};
use crate::pipeline::chunk::{self, ChunkParams};
use crate::pipeline::corpus::CorpusStore;
use crate::pipeline::reference::ReferenceSet;
use crate::pipeline::types::{OverflowPolicy, Row};

pub struct EncodingAdapter<'a> {
    encoder: &'a dyn Encoder,
    chunking: &'a ChunkParams,
}

impl<'a> EncodingAdapter<'a> {
    pub fn new(encoder: &'a dyn Encoder, chunking: &'a ChunkParams) -> Self {
        Self { encoder, chunking }
    }

    /// Embed `text` under `policy` without touching any store.
    pub fn embed(&self, text: &str, policy: OverflowPolicy) -> Result<Vec<f32>> {
        match policy {
            OverflowPolicy::Truncate => self.embed_single(text),
            OverflowPolicy::Average => {
                let segments = chunk::chunk(self.encoder.tokenizer(), text, self.chunking)?;
                let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
                let vectors = self
                    .encoder
                    .encode_batch(&refs)
                    .map_err(PipelineError::encoding)?;
                if vectors.len() != segments.len() {
                    return Err(PipelineError::encoding(anyhow::anyhow!(
                        "encoder returned {} vectors for {} segments",
                        vectors.len(),
                        segments.len()
                    )));
                }
                for v in &vectors {
                    self.check_dimension(v)?;
                }
                Ok(mean_vector(vectors))
            }
        }
    }

    /// Encode as one unit, no chunking.
    pub fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.encoder.encode(text).map_err(PipelineError::encoding)?;
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    /// Embed `row[field]` and append the pair to the corpus. The corpus is
    /// untouched if any step fails.
    pub fn embed_row(
        &self,
        corpus: &mut CorpusStore,
        row: Row,
        field: &str,
        policy: OverflowPolicy,
    ) -> Result<Vec<f32>> {
        let text = row.text(field)?;
        let embedding = self.embed(&text, policy)?;
        corpus.append(row, embedding.clone())?;
        Ok(embedding)
    }

    /// Embed a reference label (single unit) and add it to the reference set.
    pub fn embed_reference(&self, references: &mut ReferenceSet, label: &str) -> Result<Vec<f32>> {
        let embedding = self.embed_single(label)?;
        references.add(label, embedding.clone())?;
        Ok(embedding)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        let expected = self.encoder.dimensions();
        if vector.len() != expected {
            return Err(PipelineError::encoding(anyhow::anyhow!(
                "encoder returned {} dimensions, expected {expected}",
                vector.len()
            )));
        }
        Ok(())
    }
}

/// Element-wise arithmetic mean. A single vector is returned as-is.
pub fn mean_vector(mut vectors: Vec<Vec<f32>>) -> Vec<f32> {
    match vectors.len() {
        0 => Vec::new(),
        1 => vectors.swap_remove(0),
        n => {
            let dim = vectors[0].len();
            let mut sum = vec![0.0f64; dim];
            for v in &vectors {
                for (acc, x) in sum.iter_mut().zip(v) {
                    *acc += f64::from(*x);
                }
            }
            sum.into_iter().map(|s| (s / n as f64) as f32).collect()
        }
    }
}
