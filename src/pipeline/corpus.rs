//! Append-only store of embedded rows for one session.

use crate::error::{PipelineError, Result};
use crate::pipeline::types::{CorpusItem, Row};

/// Embedded rows in insertion order.
///
/// Every embedding has the same dimension, fixed by the first append. Each
/// mutation bumps [`CorpusStore::generation`] so projections computed from an
/// older state can be recognised as stale.
#[derive(Debug, Default)]
pub struct CorpusStore {
    items: Vec<CorpusItem>,
    dimension: Option<usize>,
    generation: u64,
}

impl CorpusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one row and its embedding together. Nothing is stored on error.
    pub fn append(&mut self, row: Row, embedding: Vec<f32>) -> Result<()> {
        if embedding.is_empty() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimension.unwrap_or(1),
                actual: 0,
            });
        }
        if let Some(expected) = self.dimension {
            if embedding.len() != expected {
                return Err(PipelineError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }
        self.dimension = Some(embedding.len());
        self.items.push(CorpusItem { row, embedding });
        self.generation += 1;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.dimension = None;
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CorpusItem] {
        &self.items
    }

    /// Borrowed embeddings, index-aligned with [`CorpusStore::items`].
    pub fn embeddings(&self) -> Vec<&[f32]> {
        self.items.iter().map(|item| item.embedding.as_slice()).collect()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
